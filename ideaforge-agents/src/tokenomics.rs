//! Token distribution produced by the tokenomics agent.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub label: String,
    #[serde(default)]
    pub percent: f64,
    #[serde(default)]
    pub description: String,
}

/// Either the `{"hasToken": false}` sentinel or a full distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenomicsData {
    pub has_token: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_supply",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_supply: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<Allocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_summary: Option<String>,
}

impl TokenomicsData {
    pub fn no_token() -> Self {
        Self {
            has_token: false,
            token_symbol: None,
            total_supply: None,
            allocations: Vec::new(),
            health_summary: None,
        }
    }

    /// Parse agent output. Anything beyond `hasToken` is dropped when it is false.
    pub fn from_agent_output(value: &Value) -> Result<Self, serde_json::Error> {
        let data: TokenomicsData = serde_json::from_value(value.clone())?;
        if !data.has_token {
            return Ok(Self::no_token());
        }
        Ok(data)
    }

    /// Normalize allocation percents when a token is present.
    pub fn normalize(&mut self) {
        if self.has_token {
            normalize_allocations(&mut self.allocations);
        }
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Rescale percents so they sum to exactly 100.
///
/// Each percent is rescaled against the original sum and rounded to one
/// decimal place; the last allocation then absorbs the residual.
pub fn normalize_allocations(allocations: &mut [Allocation]) {
    let Some((last, rest)) = allocations.split_last_mut() else {
        return;
    };
    let total: f64 = rest.iter().map(|a| a.percent).sum::<f64>() + last.percent;
    if total == 100.0 {
        return;
    }
    let divisor = total.max(1.0);
    for alloc in rest.iter_mut() {
        alloc.percent = round1(alloc.percent / divisor * 100.0);
    }
    let others: f64 = rest.iter().map(|a| a.percent).sum();
    last.percent = 100.0 - others;
}

/// Accept integers, floats, and numeric strings such as `"1,000,000"`.
fn lenient_supply<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => {
            let digits: String = s.chars().filter(|c| !matches!(c, ',' | '_' | ' ')).collect();
            digits.parse::<u64>().ok()
        }
        _ => None,
    })
}
