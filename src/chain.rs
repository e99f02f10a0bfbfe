use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    fmt,
    str::FromStr,
    sync::Arc,
};

/// 20-byte account or contract address, formatted as 0x-prefixed hex.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn zeroed() -> Self {
        Address([0u8; 20])
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)
            .wrap_err_with(|| format!("invalid hex in address '{s}'"))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| eyre!("address '{s}' is not 20 bytes"))?;
        Ok(Address(bytes))
    }
}

/// Argument to a remote contract call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallArg {
    Uint(u128),
    Bool(bool),
    Address(Address),
}

/// Raw result of a remote contract read: a scalar or a named-field record.
#[derive(Clone, Debug, PartialEq)]
pub enum CallValue {
    Uint(u128),
    Bool(bool),
    Address(Address),
    Record(Vec<(String, CallValue)>),
}

impl CallValue {
    pub fn as_uint(&self) -> Result<u128> {
        match self {
            CallValue::Uint(v) => Ok(*v),
            other => Err(eyre!("expected uint, got {other:?}")),
        }
    }

    pub fn as_u64(&self) -> Result<u64> {
        let v = self.as_uint()?;
        u64::try_from(v).wrap_err("uint does not fit in u64")
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            CallValue::Bool(v) => Ok(*v),
            other => Err(eyre!("expected bool, got {other:?}")),
        }
    }

    pub fn as_address(&self) -> Result<Address> {
        match self {
            CallValue::Address(a) => Ok(*a),
            other => Err(eyre!("expected address, got {other:?}")),
        }
    }

    /// Look up a named field of a record value.
    pub fn field(&self, name: &str) -> Result<&CallValue> {
        match self {
            CallValue::Record(fields) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .ok_or_else(|| eyre!("record has no field '{name}'")),
            other => Err(eyre!("expected record with field '{name}', got {other:?}")),
        }
    }
}

/// Handle for a submitted transaction. Holding one means the write has been
/// accepted by the node, not that it has applied.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TxHandle {
    pub id: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TxReceipt {
    pub block_height: u32,
}

/// Connection to a chain node. Reads reflect the latest confirmed block the
/// node has observed; writes are submitted and settle asynchronously.
pub trait ChainTransport: Send + Sync + 'static {
    fn call(
        &self,
        contract: Address,
        method: &'static str,
        args: Vec<CallArg>,
    ) -> impl Future<Output = Result<CallValue>> + Send;

    fn submit(
        &self,
        from: Address,
        contract: Address,
        method: &'static str,
        args: Vec<CallArg>,
        payment: u128,
    ) -> impl Future<Output = Result<TxHandle>> + Send;

    fn await_confirmation(
        &self,
        tx: TxHandle,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;

    /// Native-coin balance of an address (contract treasuries included).
    fn native_balance(
        &self,
        of: Address,
    ) -> impl Future<Output = Result<u128>> + Send;

    /// Timestamp of the latest confirmed block, seconds since epoch. Used as
    /// "now" for deadline and presale-window checks so the client agrees
    /// with what the contracts will enforce.
    fn latest_timestamp(&self) -> impl Future<Output = Result<u64>> + Send;
}

/// Connection state of a client session. Writes and identity-dependent reads
/// require the `Authenticated` variant; asking for a writer on anything else
/// is a typed precondition failure, not a runtime guess.
pub enum Connection<T> {
    Disconnected,
    ReadOnly(Arc<T>),
    Authenticated { transport: Arc<T>, address: Address },
}

impl<T> Clone for Connection<T> {
    fn clone(&self) -> Self {
        match self {
            Connection::Disconnected => Connection::Disconnected,
            Connection::ReadOnly(t) => Connection::ReadOnly(t.clone()),
            Connection::Authenticated { transport, address } => {
                Connection::Authenticated {
                    transport: transport.clone(),
                    address: *address,
                }
            }
        }
    }
}

impl<T: ChainTransport> Connection<T> {
    pub fn read_only(transport: Arc<T>) -> Self {
        Connection::ReadOnly(transport)
    }

    pub fn authenticated(transport: Arc<T>, address: Address) -> Self {
        Connection::Authenticated { transport, address }
    }

    fn transport(&self) -> Result<&Arc<T>> {
        match self {
            Connection::Disconnected => Err(eyre!("not connected to a node")),
            Connection::ReadOnly(t) => Ok(t),
            Connection::Authenticated { transport, .. } => Ok(transport),
        }
    }

    /// Address of the signing identity, if one is attached.
    pub fn address(&self) -> Result<Address> {
        match self {
            Connection::Authenticated { address, .. } => Ok(*address),
            _ => Err(eyre!("operation requires an authenticated signer")),
        }
    }

    pub async fn native_balance(&self, of: Address) -> Result<u128> {
        self.transport()?.native_balance(of).await
    }

    pub async fn latest_timestamp(&self) -> Result<u64> {
        self.transport()?.latest_timestamp().await
    }

    pub fn reader(&self, contract: Address) -> Result<ChainReader<T>> {
        Ok(ChainReader {
            transport: self.transport()?.clone(),
            contract,
        })
    }

    pub fn writer(&self, contract: Address) -> Result<ChainWriter<T>> {
        match self {
            Connection::Authenticated { transport, address } => Ok(ChainWriter {
                transport: transport.clone(),
                contract,
                sender: *address,
            }),
            _ => Err(eyre!("write calls require an authenticated signer")),
        }
    }
}

/// Read-only call surface of one deployed contract.
pub struct ChainReader<T> {
    transport: Arc<T>,
    contract: Address,
}

impl<T: ChainTransport> ChainReader<T> {
    pub async fn get(
        &self,
        method: &'static str,
        args: Vec<CallArg>,
    ) -> Result<CallValue> {
        self.transport
            .call(self.contract, method, args)
            .await
            .wrap_err_with(|| format!("read call '{method}' failed"))
    }
}

/// Write call surface of one deployed contract, bound to a signing identity.
pub struct ChainWriter<T> {
    transport: Arc<T>,
    contract: Address,
    sender: Address,
}

impl<T: ChainTransport> ChainWriter<T> {
    /// Submit a state-changing call with an optional value payment. The
    /// returned handle must be awaited separately; until then the write is
    /// submitted, not settled.
    pub async fn submit(
        &self,
        method: &'static str,
        args: Vec<CallArg>,
        payment: u128,
    ) -> Result<PendingCall<T>> {
        let handle = self
            .transport
            .submit(self.sender, self.contract, method, args, payment)
            .await
            .wrap_err_with(|| format!("submitting '{method}' failed"))?;
        Ok(PendingCall {
            transport: self.transport.clone(),
            method,
            handle,
        })
    }
}

/// A submitted write awaiting confirmation. State derived from reads taken
/// before `confirmed` resolves must not assume the write has applied.
pub struct PendingCall<T> {
    transport: Arc<T>,
    method: &'static str,
    handle: TxHandle,
}

impl<T: ChainTransport> PendingCall<T> {
    pub fn handle(&self) -> TxHandle {
        self.handle
    }

    /// Await settlement. No timeout is applied; this suspends until the node
    /// reports the transaction confirmed or rejected.
    pub async fn confirmed(self) -> Result<TxReceipt> {
        self.transport
            .await_confirmation(self.handle)
            .await
            .wrap_err_with(|| format!("'{}' was rejected by the contract", self.method))
    }
}
