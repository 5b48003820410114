//! Retry policies consulted by the request executor when no connection
//! is available or a node could not be reached. HTTP error responses never
//! reach a retrier.

pub mod backoff;

use std::{sync::Arc, time::Duration};

pub use backoff::{
    Backoff, ConstantBackoff, ExponentialBackoff, SimpleBackoff, StopBackoff, ZeroBackoff,
};

use crate::{context::Context, error::Result, http::Response, Error};

/// Decides whether a failed attempt is tried again.
/// ### Params
/// * **ctx**: context of the request being executed.
/// * **retry**: 1-based number of the retry being asked for.
/// * **req**: the request that failed, if one was sent.
/// * **resp**: the response, if one arrived.
/// * **err**: what went wrong.
/// ### Returns
/// `(wait, true)` to retry after `wait`, `(_, false)` to give up with `err`.
/// An `Err` gives up with that error instead.
pub trait Retrier: Send + Sync + 'static {
    fn retry(
        &self,
        ctx: &Context,
        retry: u32,
        req: Option<&reqwest::Request>,
        resp: Option<&Response>,
        err: &Error,
    ) -> Result<(Duration, bool)>;
}

pub type SharedRetrier = Arc<dyn Retrier>;

/// Never retries. The default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopRetrier;

impl Retrier for StopRetrier {
    #[inline]
    fn retry(
        &self,
        _ctx: &Context,
        _retry: u32,
        _req: Option<&reqwest::Request>,
        _resp: Option<&Response>,
        _err: &Error,
    ) -> Result<(Duration, bool)> {
        Ok((Duration::ZERO, false))
    }
}

/// Retries as long as its [Backoff] yields waits.
#[derive(Debug, Clone)]
pub struct BackoffRetrier<B> {
    backoff: B,
}

impl<B: Backoff> BackoffRetrier<B> {
    pub fn new(backoff: B) -> Self {
        Self { backoff }
    }
}

impl<B: Backoff> Retrier for BackoffRetrier<B> {
    fn retry(
        &self,
        _ctx: &Context,
        retry: u32,
        _req: Option<&reqwest::Request>,
        _resp: Option<&Response>,
        _err: &Error,
    ) -> Result<(Duration, bool)> {
        Ok(match self.backoff.next(retry) {
            Some(wait) => (wait, true),
            None => (Duration::ZERO, false),
        })
    }
}

/// Adapts a closure into a [Retrier].
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use cluster::retry::RetrierFn;
///
/// // retry transport failures twice, give up on anything else
/// let retrier = RetrierFn::new(|_ctx, retry, _req, _resp, err| {
///     Ok((Duration::from_millis(50), retry <= 2 && err.is_transport()))
/// });
/// ```
pub struct RetrierFn<F> {
    f: F,
}

impl<F> RetrierFn<F> {
    pub fn new(f: F) -> Self
    where
        F: Fn(&Context, u32, Option<&reqwest::Request>, Option<&Response>, &Error) -> Result<(Duration, bool)>
            + Send
            + Sync
            + 'static,
    {
        Self { f }
    }
}

impl<F> Retrier for RetrierFn<F>
where
    F: Fn(&Context, u32, Option<&reqwest::Request>, Option<&Response>, &Error) -> Result<(Duration, bool)>
        + Send
        + Sync
        + 'static,
{
    #[inline]
    fn retry(
        &self,
        ctx: &Context,
        retry: u32,
        req: Option<&reqwest::Request>,
        resp: Option<&Response>,
        err: &Error,
    ) -> Result<(Duration, bool)> {
        (self.f)(ctx, retry, req, resp, err)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::context::Context;

    fn ask<R: Retrier>(retrier: &R, retry: u32) -> Result<(Duration, bool)> {
        let err = Error::no_connection("all dead");
        retrier.retry(&Context::background(), retry, None, None, &err)
    }

    #[test]
    fn stop_never_retries() {
        assert!(!ask(&StopRetrier, 1).unwrap().1);
    }

    #[test]
    fn backoff_retrier_follows_sequence() {
        let retrier = BackoffRetrier::new(SimpleBackoff::new(&[100, 200]));
        assert_eq!(ask(&retrier, 1).unwrap(), (Duration::from_millis(100), true));
        assert_eq!(ask(&retrier, 2).unwrap(), (Duration::from_millis(200), true));
        assert!(!ask(&retrier, 3).unwrap().1);
    }

    #[test]
    fn closure_may_fail_fatally() {
        let retrier = RetrierFn::new(|_, retry, _, _, _| {
            if retry > 1 {
                return Err(Error::RetriesExhausted);
            }
            Ok((Duration::ZERO, true))
        });
        assert!(ask(&retrier, 1).unwrap().1);
        assert!(matches!(ask(&retrier, 2), Err(Error::RetriesExhausted)));
    }
}
