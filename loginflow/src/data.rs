use crate::util;
use chrono::{DateTime, FixedOffset};

/// Ordered header list. Names keep their recorded spelling; lookups are case-insensitive.
pub type Headers = Vec<(String, String)>;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RequestBody {
    /// Decoded form or flat JSON fields, in submission order.
    Fields(Vec<(String, String)>),
    Raw(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RequestData {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub body: Option<RequestBody>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResponseData {
    pub status_code: u16,
    pub headers: Headers,
    pub body: String,
}

/// One recorded request/response pair.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Exchange {
    pub index: usize,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub login_relevant: bool,
    pub request_data: RequestData,
    pub response_data: ResponseData,
}

impl RequestData {
    pub fn header(&self, name: &str) -> Option<&str> {
        util::find_header(&self.headers, name)
    }

    pub fn fields(&self) -> &[(String, String)] {
        match &self.body {
            Some(RequestBody::Fields(fields)) => fields,
            _ => &[],
        }
    }
}

impl ResponseData {
    pub fn header(&self, name: &str) -> Option<&str> {
        util::find_header(&self.headers, name)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }
}
