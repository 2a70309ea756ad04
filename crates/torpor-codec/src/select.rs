//! Pure content-class → codec mapping.

use torpor_types::{CodecId, ContentClass, Strategy};

/// Choose the codec for a chunk from its declared content class.
///
/// This is a pure function: no inspection of chunk bytes, no side
/// effects, and the same `(strategy, class)` always maps to the same
/// codec — which is what makes round-trip testing possible without
/// reference data.
///
/// Policy: only numeric-weights payloads with a *known* float dtype go to
/// the numeric codec, and only when the strategy enables it. Everything
/// else — text, logs, tabular data, opaque binaries, mixed chunks, and
/// every ambiguous case — takes the general codec. Correctness over
/// marginal ratio gains.
pub fn select_codec(strategy: &Strategy, class: ContentClass) -> CodecId {
    if !strategy.numeric_codec {
        return CodecId::Lz4;
    }
    match class {
        ContentClass::NumericWeights(dtype) if dtype.width().is_some() => CodecId::NumericZstd,
        _ => CodecId::Lz4,
    }
}
