//! Plan execution loop.
//!
//! Actions run strictly one at a time, in plan order. Per action:
//! confirm (force actions only) → optional before-snapshot → execute →
//! verify → optional after-snapshot. Progress lines go to the injected
//! writer; every outcome is also a structured log event.

use std::io::Write;
use std::time::Instant;

use chrono::Utc;
use unstuck_common::{Action, ActionResult, ApplyResult, Plan};
use unstuck_config::ApplySettings;

use super::confirm::Confirmer;
use super::deadline::Deadline;
use super::executor::Executor;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

/// Run loop switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplierConfig {
    /// Simulate: never execute or verify.
    pub dry_run: bool,
    /// Skip the prompt for force actions.
    pub auto_confirm: bool,
    pub continue_on_error: bool,
    /// Capture before/after snapshots.
    pub verbose: bool,
}

impl From<&ApplySettings> for ApplierConfig {
    fn from(settings: &ApplySettings) -> Self {
        ApplierConfig {
            dry_run: settings.dry_run,
            auto_confirm: settings.auto_confirm,
            continue_on_error: settings.continue_on_error,
            verbose: settings.verbose_audit,
        }
    }
}

/// Executes a [`Plan`].
pub struct Applier<'a, E: Executor + ?Sized> {
    executor: &'a E,
    confirmer: &'a mut dyn Confirmer,
    out: &'a mut dyn Write,
    config: ApplierConfig,
    deadline: Deadline,
    ctx: LogContext,
}

/// Outcome of the live path for one action.
enum Outcome {
    Succeeded,
    /// `execute` returned an error; the loop stops unless `continue_on_error`.
    ExecuteFailed,
    /// Executed, but verification errored or the post-condition was not met.
    VerifyFailed,
}

impl<'a, E: Executor + ?Sized> Applier<'a, E> {
    pub fn new(
        executor: &'a E,
        confirmer: &'a mut dyn Confirmer,
        out: &'a mut dyn Write,
        config: ApplierConfig,
    ) -> Self {
        Applier {
            executor,
            confirmer,
            out,
            config,
            deadline: Deadline::none(),
            ctx: LogContext::default(),
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_context(mut self, ctx: LogContext) -> Self {
        self.ctx = ctx;
        self
    }

    // Progress output is best-effort; a closed pipe must not abort remediation.
    fn say(&mut self, line: std::fmt::Arguments<'_>) {
        let _ = writeln!(self.out, "{}", line);
    }

    pub fn apply(&mut self, plan: &Plan) -> ApplyResult {
        let mut result = ApplyResult::begin(Utc::now(), plan.len());
        if plan.is_empty() {
            result.finish(Utc::now());
            return result;
        }

        log_event!(
            self.ctx,
            INFO,
            event_names::APPLY_STARTED,
            Stage::Apply,
            "Applying remediation plan",
            actions = plan.len(),
            dry_run = self.config.dry_run
        );

        let total = plan.len();
        for (i, action) in plan.actions.iter().enumerate() {
            if self.deadline.is_expired() {
                result.deadline_exceeded = true;
                log_event!(
                    self.ctx,
                    WARN,
                    event_names::APPLY_DEADLINE_EXCEEDED,
                    Stage::Apply,
                    "Overall timeout reached, stopping",
                    remaining = total - i
                );
                self.say(format_args!(
                    "Timeout reached after {}/{} actions; remaining actions not attempted",
                    i, total
                ));
                break;
            }

            let started = Instant::now();
            let mut record = ActionResult::started(action.clone());
            let step = format!("[{}/{}]", i + 1, total);

            if action.requires_force && !self.config.dry_run && !self.config.auto_confirm {
                if !self.confirm(action) {
                    self.say(format_args!(
                        "{} SKIPPED: {} (user declined)",
                        step, action.description
                    ));
                    record.error = "skipped by user".to_string();
                    record.duration_ms = started.elapsed().as_millis() as u64;
                    result.skipped += 1;
                    log_event!(
                        self.ctx,
                        INFO,
                        event_names::APPLY_SKIPPED,
                        Stage::Confirm,
                        "Action skipped",
                        action_id = action.id.as_str()
                    );
                    result.actions.push(record);
                    continue;
                }
            }

            if self.config.verbose && !self.config.dry_run {
                record.before = self.executor.snapshot(&action.target).ok();
            }

            let outcome = if self.config.dry_run {
                self.say(format_args!("{} DRY-RUN: {}", step, action.description));
                if !action.command.is_empty() {
                    self.say(format_args!("  Command: {}", action.command));
                }
                Outcome::Succeeded
            } else {
                self.say(format_args!("{} EXECUTING: {}", step, action.description));
                self.run_live(action, &mut record, started)
            };

            record.duration_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Outcome::Succeeded => {
                    record.success = true;
                    result.succeeded += 1;
                }
                Outcome::ExecuteFailed | Outcome::VerifyFailed => result.failed += 1,
            }

            log_event!(
                self.ctx,
                INFO,
                event_names::APPLY_ACTION_RESULT,
                Stage::Apply,
                "Action finished",
                action_id = action.id.as_str(),
                level = action.escalation_level.as_u8(),
                success = record.success,
                error = record.error.as_str(),
                duration_ms = record.duration_ms
            );
            self.audit(&record);
            result.actions.push(record);

            if matches!(outcome, Outcome::ExecuteFailed) && !self.config.continue_on_error {
                break;
            }
        }

        result.finish(Utc::now());
        log_event!(
            self.ctx,
            INFO,
            event_names::APPLY_FINISHED,
            Stage::Report,
            "Apply finished",
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            exit_code = result.exit_code
        );
        result
    }

    fn confirm(&mut self, action: &Action) -> bool {
        log_event!(
            self.ctx,
            INFO,
            event_names::CONFIRM_REQUESTED,
            Stage::Confirm,
            "Confirmation requested",
            action_id = action.id.as_str()
        );
        let accepted = match self.confirmer.confirm(action) {
            Ok(answer) => answer,
            Err(e) => {
                log_event!(
                    self.ctx,
                    WARN,
                    event_names::CONFIRM_ANSWER,
                    Stage::Confirm,
                    "Confirmation failed, treating as decline",
                    error = e.to_string().as_str()
                );
                false
            }
        };
        log_event!(
            self.ctx,
            INFO,
            event_names::CONFIRM_ANSWER,
            Stage::Confirm,
            "Confirmation answered",
            action_id = action.id.as_str(),
            accepted = accepted
        );
        accepted
    }

    fn run_live(&mut self, action: &Action, record: &mut ActionResult, started: Instant) -> Outcome {
        log_event!(
            self.ctx,
            DEBUG,
            event_names::APPLY_ACTION_ATTEMPTED,
            Stage::Apply,
            "Executing action",
            action_id = action.id.as_str(),
            operation = action.operation.as_str()
        );

        if let Err(e) = self.executor.execute(action) {
            self.say(format_args!("  Result: FAILED ({})", e));
            record.error = e.to_string();
            return Outcome::ExecuteFailed;
        }

        let verified = self.executor.verify(action);
        log_event!(
            self.ctx,
            DEBUG,
            event_names::VERIFY_RESULT,
            Stage::Verify,
            "Post-condition checked",
            action_id = action.id.as_str(),
            ok = matches!(verified, Ok(true))
        );
        let outcome = match verified {
            Err(e) => {
                self.say(format_args!("  Result: VERIFICATION FAILED ({})", e));
                record.error = format!("verification failed: {}", e);
                Outcome::VerifyFailed
            }
            Ok(false) => {
                self.say(format_args!("  Result: POST-CONDITION NOT MET"));
                record.error = "post-condition not met".to_string();
                Outcome::VerifyFailed
            }
            Ok(true) => {
                self.say(format_args!("  Result: SUCCESS ({:?})", started.elapsed()));
                Outcome::Succeeded
            }
        };

        if self.config.verbose {
            record.after = self.executor.snapshot(&action.target).ok();
        }
        outcome
    }

    fn audit(&self, record: &ActionResult) {
        if record.before.is_none() && record.after.is_none() {
            return;
        }
        let before = serde_json::to_string(&record.before).unwrap_or_default();
        let after = serde_json::to_string(&record.after).unwrap_or_default();
        log_event!(
            self.ctx,
            INFO,
            event_names::APPLY_AUDIT,
            Stage::Apply,
            "State captured",
            action_id = record.action.id.as_str(),
            before = before.as_str(),
            after = after.as_str()
        );
    }
}
