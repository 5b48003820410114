use std::{sync::Arc, time::Duration};

use slog::{debug, error, info};
use tokio::time::{sleep, Instant};

use super::Client;
use crate::{
    connections::Connection,
    context::Context,
    error::{Error, Result},
    http::{check_response, request::PreparedRequest, PerformRequestOptions, Response},
};

impl Client {
    /// Sends a request to the next alive node. Nodes that cannot be reached
    /// and an empty pool are retried as the retrier decides, a node is only
    /// marked dead once the retrier gave up on it. HTTP error responses are
    /// returned at once as [Error::Remote] and never retried.
    /// ### Params
    /// * **ctx**: canceling it aborts the request (and any backoff wait)
    /// with [Error::Canceled], connection health stays untouched.
    /// * **opts**: what to send, see [PerformRequestOptions].
    pub async fn perform_request(&self, ctx: &Context, opts: PerformRequestOptions) -> Result<Response> {
        let started = Instant::now();
        let (retrier, auth, prepared) = {
            let settings = self.inner.settings.read();
            (
                settings.retrier.clone(),
                settings.basic_auth.clone(),
                PreparedRequest::prepare(&opts, &settings.send_get_body_as, settings.gzip)?,
            )
        };
        let log = &self.inner.log;

        let mut retries = 0;
        let mut healthchecked = false;
        loop {
            if let Some(reason) = ctx.err() {
                return Err(Error::Canceled(reason));
            }

            let conn = match self.inner.pool.next(self.inner.sniff.enabled, &log.error) {
                Ok(conn) => conn,
                Err(err) => {
                    if !healthchecked {
                        // every node seems dead, check them once out of band
                        healthchecked = true;
                        tokio::select! {
                            biased;
                            reason = ctx.done() => {
                                error!(log.error, "request canceled"; "method" => %prepared.method,
                                    "reason" => %reason, "elapsed" => ?started.elapsed());
                                return Err(Error::Canceled(reason));
                            }
                            _ = self.healthcheck(self.inner.healthcheck.timeout, true) => {}
                        }
                    }
                    if let Some(reason) = ctx.err() {
                        return Err(Error::Canceled(reason));
                    }
                    retries += 1;
                    let (wait, go_on) = retrier.retry(ctx, retries, None, None, &err)?;
                    if !go_on {
                        error!(log.error, "no connection available"; "method" => %prepared.method,
                            "error" => %err, "retries" => retries - 1, "elapsed" => ?started.elapsed());
                        return Err(err);
                    }
                    _wait(ctx, wait).await?;
                    continue;
                }
            };

            let req = prepared.build(&self.inner.http, conn.url(), auth.as_ref())?;
            debug!(log.trace, "sending request";
                "method" => %req.method(), "url" => %req.url(),
                "headers" => ?req.headers(), "body_bytes" => prepared.body_len());
            let sent = req.try_clone();

            let attempt = tokio::select! {
                biased;
                reason = ctx.done() => {
                    error!(log.error, "request canceled"; "method" => %prepared.method, "url" => conn.url(),
                        "reason" => %reason, "elapsed" => ?started.elapsed());
                    return Err(Error::Canceled(reason));
                }
                attempt = self._send(req) => attempt,
            };

            let resp = match attempt {
                Ok(resp) => resp,
                Err(err) => {
                    retries += 1;
                    match retrier.retry(ctx, retries, sent.as_ref(), None, &err) {
                        Ok((wait, true)) => {
                            debug!(log.trace, "retrying request"; "url" => conn.url(), "retry" => retries, "wait" => ?wait, "error" => %err);
                            _wait(ctx, wait).await?;
                            continue;
                        }
                        Ok((_, false)) => {
                            _give_up(self, &conn, &err, started);
                            return Err(err);
                        }
                        Err(fatal) => {
                            _give_up(self, &conn, &fatal, started);
                            return Err(fatal);
                        }
                    }
                }
            };

            debug!(log.trace, "received response";
                "url" => conn.url(), "status" => resp.status,
                "headers" => ?resp.headers, "body_bytes" => resp.body.len());
            let method = prepared.method.as_str();
            let outcome = check_response(resp, &opts.ignore_errors);
            match &outcome {
                Ok(resp) => {
                    conn.mark_as_healthy();
                    info!(log.info, "request done";
                        "method" => method, "url" => conn.url(), "path" => opts.path.as_str(),
                        "status" => resp.status, "elapsed" => ?started.elapsed());
                }
                Err(err) => {
                    // the node answered, so it is alive
                    info!(log.info, "request done";
                        "method" => method, "url" => conn.url(), "path" => opts.path.as_str(),
                        "status" => err.status().unwrap_or_default(), "elapsed" => ?started.elapsed());
                }
            }
            return outcome;
        }
    }

    async fn _send(&self, req: reqwest::Request) -> Result<Response> {
        let resp = self.inner.http.execute(req).await?;
        Ok(Response::read(resp).await?)
    }
}

fn _give_up(client: &Client, conn: &Arc<Connection>, err: &Error, started: Instant) {
    conn.mark_as_dead();
    error!(client.inner.log.error, "request failed, node marked as dead";
        "url" => conn.url(), "error" => %err, "elapsed" => ?started.elapsed());
}

/// Sleeps `wait` unless `ctx` ends first.
async fn _wait(ctx: &Context, wait: Duration) -> Result<()> {
    if wait.is_zero() {
        return match ctx.err() {
            Some(reason) => Err(Error::Canceled(reason)),
            None => Ok(()),
        };
    }
    tokio::select! {
        biased;
        reason = ctx.done() => Err(Error::Canceled(reason)),
        _ = sleep(wait) => Ok(()),
    }
}
