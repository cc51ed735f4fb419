//! Query parameters for the map lookups.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::models::validation::Validator;
use crate::errors::Result;

fn trimmed(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default().trim()
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AddressQuery {
    pub address: Option<String>,
}

impl AddressQuery {
    pub fn validate(&self) -> Result<&str> {
        let address = trimmed(&self.address);
        Validator::query().min_chars("address", address, 3, "Invalid address").finish()?;
        Ok(address)
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DistanceTimeQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
}

impl DistanceTimeQuery {
    pub fn validate(&self) -> Result<(&str, &str)> {
        let origin = trimmed(&self.origin);
        let destination = trimmed(&self.destination);
        Validator::query()
            .min_chars("origin", origin, 3, "Invalid origin")
            .min_chars("destination", destination, 3, "Invalid destination")
            .finish()?;
        Ok((origin, destination))
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SuggestionsQuery {
    pub input: Option<String>,
}

impl SuggestionsQuery {
    pub fn validate(&self) -> Result<&str> {
        let input = trimmed(&self.input);
        Validator::query().check(!input.is_empty(), "input", "Input is required").finish()?;
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_validation() {
        let ok = DistanceTimeQuery {
            origin: Some(" MG Road ".to_string()),
            destination: Some("Indiranagar".to_string()),
        };
        assert_eq!(ok.validate().unwrap(), ("MG Road", "Indiranagar"));

        assert!(AddressQuery { address: Some("ab".to_string()) }.validate().is_err());
        assert!(SuggestionsQuery { input: Some("   ".to_string()) }.validate().is_err());
        assert_eq!(SuggestionsQuery { input: Some("mg".to_string()) }.validate().unwrap(), "mg");
    }
}
