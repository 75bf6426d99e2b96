//! Query-string parameters

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};

/// `GET /query?session_id=&input_message=`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryParams {
    pub session_id: String,
    pub input_message: String,
}

/// `GET /documents?session_id=`
#[derive(Debug, Clone, Deserialize)]
pub struct SessionFilter {
    pub session_id: String,
}

/// `DELETE /documents/{id}?session_id=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteDocumentParams {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `GET /jobs?session_id=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Parse a client-supplied session id
pub fn parse_session_id(raw: &str) -> Result<Uuid> {
    parse_id("session_id", raw)
}

/// Parse a UUID named `field`, rejecting anything else as a bad request
pub fn parse_id(field: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| Error::bad_request(format!("Invalid {} '{}': expected a UUID", field, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uuid_session_ids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_session_id(&id.to_string()).unwrap(), id);
        assert!(matches!(parse_session_id("abc"), Err(Error::BadRequest(_))));
        assert!(parse_id("document_id", &format!(" {} ", id)).is_ok());
    }
}
