//! Bounce notification detection

use lazy_static::lazy_static;
use mailparse::{parse_headers, MailHeaderMap};
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref BOUNCE_SUBJECT: Regex =
        Regex::new(r"^(Delivery Status Notification|Undelivered Mail Returned to Sender)").unwrap();
    static ref ADDRESS: Regex = Regex::new(r"[a-z0-9_.-]+@[a-z0-9.-]+\.[a-z.]{2,5}").unwrap();
}

/// Returns the bounced address if `raw` is a bounce notification.
///
/// Messages that are not UTF-8 are ignored, as are messages whose subject
/// is not one of the known bounce subjects. Only the headers are parsed; the
/// bounced address is the first lower-case address found in the body.
pub fn bounced_address(raw: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(raw).ok()?;

    let (headers, body_offset) = match parse_headers(text.as_bytes()) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("skipping unparseable message: {e}");
            return None;
        }
    };

    let subject = headers.get_first_value("Subject")?;
    if !BOUNCE_SUBJECT.is_match(&subject) {
        return None;
    }

    let body = text.get(body_offset..)?;

    ADDRESS.find(body).map(|m| m.as_str().to_string())
}
