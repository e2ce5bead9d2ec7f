//! Repeated quote-then-pay passes over the candidate set.

use std::time::Duration;

use chrono::Utc;
use log::{debug, info};

use cloudtrial_core::extract::{extract_payment, extract_quote};
use cloudtrial_core::{
    AcquisitionError, AcquisitionEvent, ConfigDescriptor, SessionCredentials, SkipReason,
    SubscriptionCandidate, WorkflowState, WorkflowStep,
};

use super::models::{Acquisition, PaymentRequest, QuoteTerms};
use super::run_context::RunContext;
use super::traits::AcquisitionApi;

/// Wait between a successful quote and the matching payment.
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_secs(1);

/// How the retry loop paces itself and when it gives up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between quote and payment for each candidate.
    pub pacing: Duration,
    /// Maximum number of full passes. `None` retries until cancelled.
    pub max_passes: Option<u32>,
    /// Purchase terms sent with every quote.
    pub terms: QuoteTerms,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING_INTERVAL,
            max_passes: None,
            terms: QuoteTerms::default(),
        }
    }
}

impl RetryPolicy {
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_max_passes(mut self, max_passes: Option<u32>) -> Self {
        self.max_passes = max_passes;
        self
    }
}

enum Attempt {
    Acquired(Acquisition),
    Skipped(SkipReason),
}

/// Walks the ordered candidate list until one purchase succeeds.
///
/// A pass visits every candidate once, in order. A pass without a purchase
/// starts the next one over the same list. The loop ends on the first
/// successful payment, on cancellation, or when `max_passes` is exhausted.
pub(crate) struct CandidateRetryLoop<'a> {
    api: &'a dyn AcquisitionApi,
    credentials: &'a SessionCredentials,
    policy: &'a RetryPolicy,
    config: ConfigDescriptor,
    candidates: Vec<SubscriptionCandidate>,
}

impl<'a> CandidateRetryLoop<'a> {
    pub(crate) fn new(
        api: &'a dyn AcquisitionApi,
        credentials: &'a SessionCredentials,
        policy: &'a RetryPolicy,
        config: ConfigDescriptor,
        candidates: Vec<SubscriptionCandidate>,
    ) -> Self {
        Self {
            api,
            credentials,
            policy,
            config,
            candidates,
        }
    }

    pub(crate) async fn run(&self, ctx: &RunContext<'_>) -> Result<Acquisition, AcquisitionError> {
        if self.candidates.is_empty() {
            return Err(AcquisitionError::Schema("missing subscription".to_string()));
        }

        let mut pass: u32 = 0;
        loop {
            if let Some(max) = self.policy.max_passes {
                if pass >= max {
                    return Err(AcquisitionError::PassLimitReached { passes: pass });
                }
            }
            pass += 1;
            debug!(
                "[Acquisition] Pass {} over {} candidates",
                pass,
                self.candidates.len()
            );

            for candidate in &self.candidates {
                match self.attempt(ctx, candidate, pass).await? {
                    Attempt::Acquired(acquisition) => return Ok(acquisition),
                    Attempt::Skipped(reason) => {
                        debug!(
                            "[Acquisition] Skipping network {}: {:?}",
                            candidate.network_id, reason
                        );
                        ctx.emit(AcquisitionEvent::CandidateSkipped {
                            run_id: ctx.run_id,
                            pass,
                            network_id: candidate.network_id.clone(),
                            reason,
                        });
                    }
                }
            }

            ctx.emit(AcquisitionEvent::PassCompleted {
                run_id: ctx.run_id,
                pass,
            });
        }
    }

    async fn attempt(
        &self,
        ctx: &RunContext<'_>,
        candidate: &SubscriptionCandidate,
        pass: u32,
    ) -> Result<Attempt, AcquisitionError> {
        ctx.check(WorkflowStep::Quote)?;
        ctx.transition(WorkflowState::Quoting {
            network_id: candidate.network_id.clone(),
            pass,
        });

        let request = self
            .policy
            .terms
            .quote_for(&self.config.config_id, &candidate.network_id);
        let quote = match ctx
            .guard(
                WorkflowStep::Quote,
                self.api.quote_price(self.credentials, &request),
            )
            .await?
        {
            Ok(payload) => extract_quote(&payload),
            Err(e) => {
                return Ok(Attempt::Skipped(SkipReason::QuoteFailed {
                    message: e.to_string(),
                }))
            }
        };
        let Some(amount_id) = quote.amount_id else {
            return Ok(Attempt::Skipped(SkipReason::NoQuote));
        };

        ctx.guard(WorkflowStep::Pacing, tokio::time::sleep(self.policy.pacing))
            .await?;

        ctx.transition(WorkflowState::Paying {
            network_id: candidate.network_id.clone(),
            pass,
        });
        let payment = match ctx
            .guard(
                WorkflowStep::Payment,
                self.api
                    .submit_payment(self.credentials, &PaymentRequest::free(amount_id.as_str())),
            )
            .await?
        {
            Ok(payload) => extract_payment(&payload),
            Err(e) => {
                return Ok(Attempt::Skipped(SkipReason::PaymentFailed {
                    message: e.to_string(),
                }))
            }
        };

        if !payment.is_success() {
            return Ok(Attempt::Skipped(SkipReason::PaymentRejected {
                code: payment.code,
                message: payment.message,
            }));
        }

        info!(
            "[Acquisition] Payment accepted for network {} on pass {}",
            candidate.network_id, pass
        );
        Ok(Attempt::Acquired(Acquisition {
            config: self.config.clone(),
            candidate: candidate.clone(),
            amount_id,
            pass,
            payment,
            acquired_at: Utc::now(),
        }))
    }
}
