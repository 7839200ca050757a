//! Threshold-based float assertions for tests.
//!
//! Convolution through a transform accumulates rounding error proportional to the filter length, so these take an
//! explicit threshold rather than comparing against epsilon.

#[track_caller]
pub(crate) fn close_floats32(a: f32, b: f32, threshold: f32) {
    let diff = (a - b).abs();
    assert!(
        diff < threshold,
        "{} vs {}, difference {} is greater than threshold {}",
        a,
        b,
        diff,
        threshold
    );
}

/// Compare two slices element by element, reporting the first index which differs.
#[track_caller]
pub(crate) fn close_slices32(got: &[f32], expected: &[f32], threshold: f32) {
    assert_eq!(got.len(), expected.len(), "slice lengths differ");
    for (i, (a, b)) in got.iter().zip(expected.iter()).enumerate() {
        let diff = (a - b).abs();
        assert!(
            diff < threshold,
            "index {}: {} vs {}, difference {} is greater than threshold {}",
            i,
            a,
            b,
            diff,
            threshold
        );
    }
}
