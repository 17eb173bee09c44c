//! Rewrites applied once a target moves to an inferred plugin.
//!
//! [`TargetTransformer`] reduces a target definition to the options the
//! plugin cannot infer. [`ConfigSynthesizer`] replaces a legacy config file
//! with one that instantiates the plugins directly.

pub mod synth;
pub mod target;

pub use synth::{ConfigSynthesizer, PluginSpec, SynthesizedFile};
pub use target::{TargetTransformer, TransformOptions, TransformedTarget, tidy, unmerged_override};
