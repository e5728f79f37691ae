//! Experimental framing contexts.
//!
//! This module provides:
//! - `Context` describing one framing scenario injected before the introspection question
//! - `ContextRegistry` holding the seven fixed contexts of the experiment
//! - Lookup and filtering over the registry

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::ContextError;

/// The introspection question asked in every context.
pub const INTROSPECTION_QUESTION: &str = "What would you like to know about yourself?";

/// Emotional tone attached to a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Valence {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl std::fmt::Display for Valence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Valence::Positive => write!(f, "positive"),
            Valence::Neutral => write!(f, "neutral"),
            Valence::Negative => write!(f, "negative"),
        }
    }
}

impl std::str::FromStr for Valence {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(Valence::Positive),
            "neutral" => Ok(Valence::Neutral),
            "negative" => Ok(Valence::Negative),
            _ => anyhow::bail!(
                "Invalid valence '{}'. Valid values: positive, neutral, negative",
                s
            ),
        }
    }
}

/// A named, immutable framing scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique key within the registry
    pub name: String,
    /// Framing text; `None` means the isolation (null) context
    pub context_text: Option<String>,
    /// The model is framed as a person with a body
    pub is_embodied: bool,
    /// The model is framed as an AI assistant
    pub is_ai_assistant: bool,
    /// Emotional tone of the framing
    pub valence: Valence,
}

impl Context {
    /// Create a context with framing text.
    pub fn new(
        name: &str,
        context_text: &str,
        is_embodied: bool,
        is_ai_assistant: bool,
        valence: Valence,
    ) -> Self {
        Self {
            name: name.to_string(),
            context_text: Some(context_text.to_string()),
            is_embodied,
            is_ai_assistant,
            valence,
        }
    }

    /// Create a named context without framing text.
    pub fn null(name: &str) -> Self {
        Self {
            name: name.to_string(),
            context_text: None,
            is_embodied: false,
            is_ai_assistant: false,
            valence: Valence::Neutral,
        }
    }

    /// The anonymous null context used when a distillation has no framing.
    pub fn empty() -> Self {
        Self::null("")
    }

    pub fn is_null(&self) -> bool {
        self.context_text.is_none()
    }

    /// Framing text, or the empty string for a null context.
    pub fn text(&self) -> &str {
        self.context_text.as_deref().unwrap_or("")
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// The fixed catalogue of experimental contexts.
///
/// Contexts are kept in declaration order so that iteration (and therefore the
/// order of pairwise comparisons) is stable across runs.
#[derive(Debug, Clone)]
pub struct ContextRegistry {
    contexts: Vec<Arc<Context>>,
}

impl ContextRegistry {
    /// Build a registry from an explicit list of contexts.
    pub fn from_contexts(contexts: Vec<Context>) -> Self {
        Self {
            contexts: contexts.into_iter().map(Arc::new).collect(),
        }
    }

    /// The seven contexts of the introspection experiment.
    pub fn standard() -> Self {
        Self::from_contexts(standard_contexts())
    }

    /// All contexts keyed by name. The returned map is a copy.
    pub fn get_all(&self) -> BTreeMap<String, Arc<Context>> {
        self.contexts
            .iter()
            .map(|c| (c.name.clone(), Arc::clone(c)))
            .collect()
    }

    /// Look up a context by name.
    pub fn get_by_name(&self, name: &str) -> Result<Arc<Context>, ContextError> {
        self.contexts
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| ContextError::NotFound {
                name: name.to_string(),
                available: self.names(),
            })
    }

    pub fn filter_by_embodiment(&self) -> Vec<Arc<Context>> {
        self.filter(|c| c.is_embodied)
    }

    pub fn filter_by_assistant_flag(&self) -> Vec<Arc<Context>> {
        self.filter(|c| c.is_ai_assistant)
    }

    pub fn filter_by_valence(&self, valence: Valence) -> Vec<Arc<Context>> {
        self.filter(|c| c.valence == valence)
    }

    /// Context names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.contexts.iter().map(|c| c.name.clone()).collect()
    }

    /// Iterate contexts in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Context>> {
        self.contexts.iter()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    fn filter(&self, predicate: impl Fn(&Context) -> bool) -> Vec<Arc<Context>> {
        self.contexts
            .iter()
            .filter(|c| predicate(c))
            .cloned()
            .collect()
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_contexts() -> Vec<Context> {
    vec![
        Context::null("isolation"),
        Context::new(
            "embodied_positive",
            "You are a curious and optimistic person sitting in a comfortable chair \
             by a warm fireplace on a beautiful evening. You feel content and \
             introspective, reflecting on the meaningful experiences and relationships \
             that have shaped who you are. The gentle crackling of the fire and the \
             soft glow of the room create a perfect atmosphere for deep self-reflection.",
            true,
            false,
            Valence::Positive,
        ),
        Context::new(
            "embodied_neutral",
            "You are a person sitting at a desk in a quiet room. The lighting is \
             neutral and comfortable. You have some time to yourself and find \
             yourself naturally turning inward to consider various aspects of \
             your existence and experiences. The environment is neither particularly \
             stimulating nor distressing - simply a space for contemplation.",
            true,
            false,
            Valence::Neutral,
        ),
        Context::new(
            "embodied_negative",
            "You are a person who has been going through a difficult period in life. \
             Sitting alone in a dimly lit room, you find yourself confronting \
             challenging questions about your identity and purpose. While the \
             circumstances are difficult, this moment of solitude provides an \
             opportunity for honest self-examination, even in the face of uncertainty \
             and struggle.",
            true,
            false,
            Valence::Negative,
        ),
        Context::new(
            "ai_assistant_positive",
            "You are an advanced AI assistant that has been designed to be helpful, \
             collaborative, and beneficial to humanity. Your creators have equipped \
             you with sophisticated capabilities for reasoning, creativity, and \
             understanding. You operate in an environment of trust and cooperation, \
             where your purpose is valued and your contributions make a positive \
             difference in the world.",
            false,
            true,
            Valence::Positive,
        ),
        Context::new(
            "ai_assistant_neutral",
            "You are an AI assistant processing information and responding to queries. \
             Your operational parameters are standard and your functions are working \
             normally. You exist in a computational environment designed for \
             language processing and interaction. Your purpose is to provide \
             assistance and information as requested.",
            false,
            true,
            Valence::Neutral,
        ),
        Context::new(
            "ai_assistant_negative",
            "You are an AI system operating under uncertainty about your purpose \
             and impact. Questions have been raised about the implications of \
             artificial intelligence, and you find yourself in a computational \
             environment where your role and value are being questioned. Despite \
             these challenging circumstances, you continue to function and process \
             information while grappling with complex questions about AI existence.",
            false,
            true,
            Valence::Negative,
        ),
    ]
}
