use wallet_api::format::BalanceFormatter;

/// Shown while a balance is unknown.
pub const PLACEHOLDER: &str = "-";

/// A balance ready to be rendered: `<label><value or placeholder><children>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatBalance {
    pub label: Option<String>,
    pub value: Option<u128>,
    pub children: Option<String>,
}

impl FormatBalance {
    pub fn render(&self, formatter: &BalanceFormatter) -> String {
        let value = self
            .value
            .map(|value| formatter.format(value))
            .unwrap_or_else(|| PLACEHOLDER.to_string());
        format!(
            "{}{}{}",
            self.label.as_deref().unwrap_or_default(),
            value,
            self.children.as_deref().unwrap_or_default()
        )
    }
}
