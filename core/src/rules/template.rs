//! Template conditions
//!
//! Template results are pushed asynchronously by an external subscription
//! service. Until a result arrives, a small synchronous fallback recognizes
//! direct equality checks against one entity; anything else is visible.
//!
//! ```text
//!   evaluate(template) ──► TemplateStore::lookup_or_subscribe
//!                               │ hit          │ miss (first time)
//!                               ▼              ▼
//!                           push result    SubscriptionRequest ──► host service
//!                                              │
//!                                   TemplateUpdate (mpsc) ◄────────┘
//! ```

use hashbrown::{HashMap, HashSet};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Stable identity of a template expression.
///
/// Derived only from the expression text so re-renders never create a
/// second subscription for the same template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateHash(u64);

impl TemplateHash {
    pub fn of(expression: &str) -> Self {
        let digest = blake3::hash(expression.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        Self(u64::from_le_bytes(head))
    }
}

impl std::fmt::Display for TemplateHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Result pushed by the subscription service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateUpdate {
    pub hash: TemplateHash,
    pub value: bool,
}

/// Ask the host to start a live subscription for an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub hash: TemplateHash,
    pub expression: String,
}

/// Pushed template results plus subscription bookkeeping
#[derive(Debug)]
pub struct TemplateStore {
    results: HashMap<TemplateHash, bool>,
    requested: HashSet<TemplateHash>,
    pending_requests: Vec<SubscriptionRequest>,
    updates_tx: UnboundedSender<TemplateUpdate>,
    updates_rx: UnboundedReceiver<TemplateUpdate>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    pub fn new() -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            results: HashMap::new(),
            requested: HashSet::new(),
            pending_requests: Vec::new(),
            updates_tx,
            updates_rx,
        }
    }

    /// Channel the subscription service pushes results into
    pub fn sender(&self) -> UnboundedSender<TemplateUpdate> {
        self.updates_tx.clone()
    }

    /// Apply every queued update. Returns how many results changed.
    pub fn drain_updates(&mut self) -> usize {
        let mut changed = 0;
        while let Ok(update) = self.updates_rx.try_recv() {
            if self.results.insert(update.hash, update.value) != Some(update.value) {
                changed += 1;
            }
        }
        if changed > 0 {
            tracing::debug!(changed, "Applied template results");
        }
        changed
    }

    /// Record a result synchronously (same effect as a pushed update)
    pub fn set_result(&mut self, hash: TemplateHash, value: bool) {
        self.results.insert(hash, value);
    }

    pub fn result(&self, hash: TemplateHash) -> Option<bool> {
        self.results.get(&hash).copied()
    }

    /// Look up the pushed result; on a miss, queue one subscription request
    pub fn lookup_or_subscribe(&mut self, expression: &str) -> Option<bool> {
        let hash = TemplateHash::of(expression);
        if let Some(value) = self.result(hash) {
            return Some(value);
        }
        if self.requested.insert(hash) {
            tracing::debug!(%hash, "Requesting template subscription");
            self.pending_requests.push(SubscriptionRequest {
                hash,
                expression: expression.to_string(),
            });
        }
        None
    }

    /// Drain subscription requests for the host service
    pub fn take_subscription_requests(&mut self) -> Vec<SubscriptionRequest> {
        std::mem::take(&mut self.pending_requests)
    }

    /// Number of distinct expressions ever requested
    pub fn subscription_count(&self) -> usize {
        self.requested.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Synchronous fallback
// ─────────────────────────────────────────────────────────────────────────────

/// A recognized "entity value equals X" check
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TemplateCheck {
    pub entity: String,
    pub value: String,
    pub negate: bool,
}

impl TemplateCheck {
    pub fn matches(&self, actual: &str) -> bool {
        (actual == self.value) != self.negate
    }
}

/// Recognize the closed set of fallback patterns:
///
/// - `is_state('e', 'v')` and `not is_state('e', 'v')`
/// - `states('e') == 'v'` / `!=`
/// - `states.e.state == 'v'` / `!=`
///
/// optionally wrapped in `{{ }}`. Anything else returns `None`.
pub(crate) fn parse_fallback(expression: &str) -> Option<TemplateCheck> {
    let mut body = expression.trim();
    if let Some(inner) = body.strip_prefix("{{").and_then(|s| s.strip_suffix("}}")) {
        body = inner.trim();
    }

    let (negate, body) = match body.strip_prefix("not ") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, body),
    };

    let check = parse_is_state(body)
        .or_else(|| parse_states_call(body))
        .or_else(|| parse_states_attr(body))?;

    Some(TemplateCheck {
        negate: check.negate != negate,
        ..check
    })
}

fn parse_is_state(body: &str) -> Option<TemplateCheck> {
    let rest = body.strip_prefix("is_state")?.trim_start().strip_prefix('(')?;
    let (entity, rest) = take_quoted(rest)?;
    let rest = rest.trim_start().strip_prefix(',')?;
    let (value, rest) = take_quoted(rest)?;
    let rest = rest.trim_start().strip_prefix(')')?;
    finish(rest)?;
    Some(TemplateCheck {
        entity,
        value,
        negate: false,
    })
}

fn parse_states_call(body: &str) -> Option<TemplateCheck> {
    let rest = body.strip_prefix("states")?.trim_start().strip_prefix('(')?;
    let (entity, rest) = take_quoted(rest)?;
    let rest = rest.trim_start().strip_prefix(')')?;
    parse_comparison(entity, rest)
}

fn parse_states_attr(body: &str) -> Option<TemplateCheck> {
    let rest = body.strip_prefix("states.")?;
    // The `.state` accessor, not an object id that merely starts with `state`
    let end = rest.match_indices(".state").map(|(i, _)| i).find(|&i| {
        !rest[i + ".state".len()..]
            .starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
    })?;
    let entity = &rest[..end];
    // domain.object_id, both non-empty identifiers
    let (domain, object_id) = entity.split_once('.')?;
    let ident = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !ident(domain) || !ident(object_id) {
        return None;
    }
    parse_comparison(entity.to_string(), &rest[end + ".state".len()..])
}

fn parse_comparison(entity: String, rest: &str) -> Option<TemplateCheck> {
    let rest = rest.trim_start();
    let (negate, rest) = if let Some(r) = rest.strip_prefix("==") {
        (false, r)
    } else if let Some(r) = rest.strip_prefix("!=") {
        (true, r)
    } else {
        return None;
    };
    let (value, rest) = take_quoted(rest)?;
    finish(rest)?;
    Some(TemplateCheck {
        entity,
        value,
        negate,
    })
}

/// Take a `'single'` or `"double"` quoted literal, skipping leading whitespace
fn take_quoted(input: &str) -> Option<(String, &str)> {
    let input = input.trim_start();
    let quote = input.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &input[1..];
    let end = body.find(quote)?;
    Some((body[..end].to_string(), &body[end + 1..]))
}

fn finish(rest: &str) -> Option<()> {
    rest.trim().is_empty().then_some(())
}
