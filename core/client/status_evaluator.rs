//! StatusEvaluator — classifies `(statusCode, requestKind)` into
//! accept/retry decisions for `RetryableClient`.

use crate::transport::RequestKind;

/// `accept(status_code, kind) == true` means install the client that
/// produced this response as the retryable client's delegate and return the
/// response to the caller; `false` means retry against the next candidate.
pub trait StatusEvaluator: Send + Sync {
    fn accept(&self, status_code: u16, kind: RequestKind) -> bool;
}

/// The legacy evaluator: for reads, only 2xx is accepted. For writes
/// (register/cancel/heartbeat/status-update), 2xx and 4xx are both
/// accepted — a 4xx on a write is authoritative client error, not a
/// transient failure, so retrying against another server would not help.
/// 5xx is never accepted. 3xx is treated as retry-on-next because redirect
/// handling belongs to `RedirectingClient`, a layer below this one.
pub struct LegacyStatusEvaluator;

impl StatusEvaluator for LegacyStatusEvaluator {
    fn accept(&self, status_code: u16, kind: RequestKind) -> bool {
        let is_2xx = (200..300).contains(&status_code);
        let is_4xx = (400..500).contains(&status_code);

        match kind {
            RequestKind::Read => is_2xx,
            RequestKind::Register | RequestKind::Cancel | RequestKind::Heartbeat | RequestKind::StatusUpdate => {
                is_2xx || is_4xx
            }
        }
    }
}

/// An evaluator that only ever accepts 2xx, regardless of request kind.
/// Useful for callers that want strict success semantics (e.g. a bootstrap
/// client that should never treat a 404 as "done").
pub struct StrictStatusEvaluator;

impl StatusEvaluator for StrictStatusEvaluator {
    fn accept(&self, status_code: u16, _kind: RequestKind) -> bool {
        (200..300).contains(&status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_accepts_2xx_for_reads() {
        let e = LegacyStatusEvaluator;
        assert!(e.accept(200, RequestKind::Read));
        assert!(!e.accept(404, RequestKind::Read));
        assert!(!e.accept(500, RequestKind::Read));
    }

    #[test]
    fn legacy_accepts_4xx_as_authoritative_for_writes() {
        let e = LegacyStatusEvaluator;
        assert!(e.accept(200, RequestKind::Heartbeat));
        assert!(e.accept(404, RequestKind::Heartbeat));
        assert!(!e.accept(500, RequestKind::Heartbeat));
    }

    #[test]
    fn legacy_treats_3xx_as_retry_on_next_for_every_kind() {
        let e = LegacyStatusEvaluator;
        assert!(!e.accept(302, RequestKind::Read));
        assert!(!e.accept(302, RequestKind::Register));
    }

    #[test]
    fn strict_never_accepts_4xx() {
        let e = StrictStatusEvaluator;
        assert!(!e.accept(404, RequestKind::Register));
    }
}
