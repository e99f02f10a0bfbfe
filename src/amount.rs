//! Free-text amount entry for bulk token purchases, constrained to a safe
//! non-negative integer bounded by the maximum supply.

/// Validated mint-amount input. `text` always reflects what should be shown
/// in the entry field; `value` is the last accepted amount. Rejected edits
/// drop the offending trailing character and leave the accepted value alone,
/// so an invalid amount never reaches downstream state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MintAmountInput {
    max_supply: u64,
    text: String,
    value: u64,
}

impl MintAmountInput {
    pub fn new(max_supply: u64) -> Self {
        Self {
            max_supply,
            text: String::new(),
            value: 0,
        }
    }

    /// Last accepted amount, always in `0..=max_supply`.
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Apply one edit of the raw field contents.
    ///
    /// Empty input is accepted as "no amount chosen yet" (value 0). Input
    /// must otherwise be digits without a leading zero and parse to at most
    /// `max_supply`; anything else keeps the prior value and truncates the
    /// trailing character instead of silently clamping.
    pub fn apply_edit(&mut self, raw: &str) {
        if raw.is_empty() {
            self.text.clear();
            self.value = 0;
            return;
        }
        if is_amount_shaped(raw) {
            if let Ok(parsed) = raw.parse::<u64>() {
                if parsed <= self.max_supply {
                    self.text = raw.to_string();
                    self.value = parsed;
                    return;
                }
            }
        }
        let mut kept = raw.to_string();
        kept.pop();
        self.text = kept;
    }
}

/// One or more digits, no non-significant leading zero.
fn is_amount_shaped(raw: &str) -> bool {
    let mut chars = raw.chars();
    matches!(chars.next(), Some('1'..='9')) && chars.all(|c| c.is_ascii_digit())
}
