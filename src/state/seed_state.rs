/// Seed state definitions for tracking pagination progress
///
/// Every seed walks `NotStarted -> InProgress -> {Exhausted | Failed}` exactly
/// once per run; the terminal states are never left again.
use std::fmt;
use thiserror::Error;

/// Why a seed stopped before its pagination end was signalled by a 404
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The response resolved to a different resource than requested
    RedirectMismatch { actual: String },

    /// Every attempt answered with the transient status
    RetryExhausted { attempts: u32 },

    /// Network error, unexpected status, or an unreadable page
    Fatal(String),
}

impl FailureReason {
    /// Short label used for aggregation in summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::RedirectMismatch { .. } => "redirect_mismatch",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::Fatal(_) => "fatal",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RedirectMismatch { actual } => write!(f, "redirected to {}", actual),
            Self::RetryExhausted { attempts } => {
                write!(f, "retries exhausted after {} attempts", attempts)
            }
            Self::Fatal(cause) => write!(f, "{}", cause),
        }
    }
}

/// Represents the pagination state of one seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedState {
    // ===== Active States =====
    /// Seed is queued but no page has been requested yet
    NotStarted,

    /// Seed is being paginated; `cursor` is the next page to fetch
    InProgress { cursor: u32 },

    // ===== Terminal States =====
    /// Pagination ended; `capped` is set when the page cap stopped it
    Exhausted { pages: u32, capped: bool },

    /// Pagination was abandoned after `pages` emitted pages
    Failed { pages: u32, reason: FailureReason },
}

/// Rejected state transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid seed state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: String,
    pub to: String,
}

impl SeedState {
    /// Returns true if this is a terminal state (no further fetches)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::Failed { .. })
    }

    /// Returns true if this seed still belongs in the work queue
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this seed ended in a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Next page to fetch, if any
    pub fn cursor(&self) -> Option<u32> {
        match self {
            Self::NotStarted => Some(1),
            Self::InProgress { cursor } => Some(*cursor),
            _ => None,
        }
    }

    /// Number of pages already emitted for this seed
    pub fn pages_emitted(&self) -> u32 {
        match self {
            Self::NotStarted => 0,
            Self::InProgress { cursor } => cursor - 1,
            Self::Exhausted { pages, .. } | Self::Failed { pages, .. } => *pages,
        }
    }

    /// `NotStarted -> InProgress { cursor: 1 }`
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        match self {
            Self::NotStarted => {
                *self = Self::InProgress { cursor: 1 };
                Ok(())
            }
            _ => Err(self.invalid("in_progress")),
        }
    }

    /// Advances the cursor after a page was emitted
    pub fn advance(&mut self) -> Result<u32, InvalidTransition> {
        match self {
            Self::InProgress { cursor } => {
                *cursor += 1;
                Ok(*cursor)
            }
            _ => Err(self.invalid("in_progress")),
        }
    }

    /// Ends pagination cleanly
    pub fn exhaust(&mut self, capped: bool) -> Result<(), InvalidTransition> {
        match self {
            Self::InProgress { .. } => {
                let pages = self.pages_emitted();
                *self = Self::Exhausted { pages, capped };
                Ok(())
            }
            _ => Err(self.invalid("exhausted")),
        }
    }

    /// Abandons pagination
    pub fn fail(&mut self, reason: FailureReason) -> Result<(), InvalidTransition> {
        match self {
            Self::InProgress { .. } => {
                let pages = self.pages_emitted();
                *self = Self::Failed { pages, reason };
                Ok(())
            }
            _ => Err(self.invalid("failed")),
        }
    }

    /// Short state label
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress { .. } => "in_progress",
            Self::Exhausted { capped: false, .. } => "exhausted",
            Self::Exhausted { capped: true, .. } => "capped",
            Self::Failed { .. } => "failed",
        }
    }

    fn invalid(&self, to: &str) -> InvalidTransition {
        InvalidTransition {
            from: self.label().to_string(),
            to: to.to_string(),
        }
    }
}

impl Default for SeedState {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl fmt::Display for SeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress { cursor } => write!(f, "in_progress(page {})", cursor),
            Self::Failed { reason, .. } => write!(f, "failed({})", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}
