use crate::error::Error;

/// Check whether an error is a 429 rate limit. The HTTP client folds status
/// codes into the `Api` message, so this is a string check.
pub fn is_rate_limited(e: &Error) -> bool {
    match e {
        Error::Api(message) => {
            message.contains("429") || message.to_lowercase().contains("rate limit")
        }
        _ => false,
    }
}

/// Retry an API call expression with backoff on 429 errors.
///
/// Usage: `retry_api!(api.issue_by_id(id))`
///
/// The expression is re-evaluated on each retry attempt. This is a macro
/// because async closures that return borrowed futures can't satisfy `Fn`.
macro_rules! retry_api {
    ($expr:expr) => {{
        let mut _attempt: u32 = 0;
        loop {
            match $expr.await {
                Ok(val) => break Ok::<_, $crate::error::Error>(val),
                Err(e) => {
                    if $crate::sync::rate_limit::is_rate_limited(&e) && _attempt < 3 {
                        let wait = [60u64, 120, 240]
                            .get(_attempt as usize)
                            .copied()
                            .unwrap_or(240);
                        log::warn!(
                            "Rate limited (429). Waiting {wait}s before retry {}/3",
                            _attempt + 1
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
                        _attempt += 1;
                    } else {
                        break Err(e);
                    }
                }
            }
        }
    }};
}

pub(crate) use retry_api;
