use serde::Serialize;

/// Currency prices are shown in. Vehicle prices are stored in USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayCurrency {
    Usd,
    Inr,
}

impl DisplayCurrency {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "USD" => Some(DisplayCurrency::Usd),
            "INR" => Some(DisplayCurrency::Inr),
            _ => None,
        }
    }

    /// Conversion rate used when none is configured.
    pub fn default_rate(self) -> f64 {
        match self {
            DisplayCurrency::Usd => 1.0,
            DisplayCurrency::Inr => 83.0,
        }
    }
}

/// Display currency and the single USD conversion rate applied to every shown price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingConfig {
    pub currency: DisplayCurrency,
    pub usd_rate: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: DisplayCurrency::Usd,
            usd_rate: 1.0,
        }
    }
}

impl PricingConfig {
    pub fn new(currency: DisplayCurrency, usd_rate: Option<f64>) -> Self {
        Self {
            currency,
            usd_rate: usd_rate.unwrap_or_else(|| currency.default_rate()),
        }
    }

    pub fn convert(&self, usd: f64) -> f64 {
        usd * self.usd_rate
    }

    /// Formats a USD amount in the display currency.
    ///
    /// USD: `$12,345.00`. INR: whole rupees with Indian digit grouping, `₹12,34,567`.
    pub fn format_price(&self, usd: f64) -> String {
        let amount = self.convert(usd);
        let negative = amount < 0.0;
        let amount = amount.abs();

        let formatted = match self.currency {
            DisplayCurrency::Usd => {
                let cents = (amount * 100.0).round() as u64;
                format!(
                    "${}.{:02}",
                    group_thousands(&(cents / 100).to_string()),
                    cents % 100
                )
            }
            DisplayCurrency::Inr => {
                let rupees = amount.round() as u64;
                format!("₹{}", group_indian(&rupees.to_string()))
            }
        };

        if negative {
            format!("-{}", formatted)
        } else {
            formatted
        }
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Last three digits, then groups of two: 1234567 -> 12,34,567.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);

    let mut out = String::with_capacity(digits.len() + digits.len() / 2);
    for (i, c) in head.chars().enumerate() {
        if i > 0 && (head.len() - i) % 2 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.push(',');
    out.push_str(tail);
    out
}
