use parking_lot::RwLock;

/// Display settings that depend on the connected chain's token.
pub trait DisplayDefaults: Send + Sync {
    fn set_balance_defaults(&self, decimals: u32, unit: &str);
    fn set_input_unit(&self, unit: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatDefaults {
    pub decimals: u32,
    pub unit: String,
}

impl Default for FormatDefaults {
    fn default() -> Self {
        Self {
            decimals: 0,
            unit: "Unit".to_string(),
        }
    }
}

/// Fraction digits shown after the decimal point.
const DISPLAY_FRACTION: usize = 4;

/// Shared balance formatter. One instance serves the whole UI tree.
#[derive(Debug, Default)]
pub struct BalanceFormatter {
    defaults: RwLock<FormatDefaults>,
    input_unit: RwLock<String>,
}

impl BalanceFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults(&self) -> FormatDefaults {
        self.defaults.read().clone()
    }

    pub fn input_unit(&self) -> String {
        self.input_unit.read().clone()
    }

    /// `1234567800000000` at 12 decimals and unit `DEV` gives `"1,234.5678 DEV"`.
    pub fn format(&self, value: u128) -> String {
        let defaults = self.defaults.read();
        format_units(value, defaults.decimals as usize, &defaults.unit)
    }
}

impl DisplayDefaults for BalanceFormatter {
    fn set_balance_defaults(&self, decimals: u32, unit: &str) {
        *self.defaults.write() = FormatDefaults {
            decimals,
            unit: unit.to_string(),
        };
    }

    fn set_input_unit(&self, unit: &str) {
        *self.input_unit.write() = unit.to_string();
    }
}

fn format_units(value: u128, decimals: usize, unit: &str) -> String {
    let digits = format!("{value:0>width$}", width = decimals + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals);
    let whole = group_thousands(whole);
    if decimals == 0 {
        return format!("{whole} {unit}");
    }
    let shown = &fraction[..fraction.len().min(DISPLAY_FRACTION)];
    format!("{whole}.{shown:0<width$} {unit}", width = DISPLAY_FRACTION)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
