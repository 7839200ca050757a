/// Linear convolution by directly evaluating the sum, accumulated in `f64`.
///
/// The output is `input.len() + impulse.len() - 1` frames long, tail included, or empty if either argument is.
/// Complexity is `theta(M*N)`, so this is only suitable as a reference and for very short filters.
pub fn convolve_direct(input: &[f32], impulse: &[f32]) -> Vec<f32> {
    if input.is_empty() || impulse.is_empty() {
        return Vec::new();
    }

    let mut output = vec![0.0f64; input.len() + impulse.len() - 1];
    for (i, x) in input.iter().enumerate() {
        for (j, h) in impulse.iter().enumerate() {
            output[i + j] += *x as f64 * *h as f64;
        }
    }

    output.into_iter().map(|x| x as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        let got = convolve_direct(&[1.0, 2.0, 3.0, 4.0, 5.0], &[1.0, 2.0, 3.0]);
        assert_eq!(got, vec![1.0, 4.0, 10.0, 16.0, 22.0, 22.0, 15.0]);
    }

    #[test]
    fn unit_impulse_is_identity() {
        let input = [0.5, -0.25, 1.0];
        assert_eq!(convolve_direct(&input, &[1.0]), input.to_vec());
    }

    #[test]
    fn empty_arguments() {
        assert!(convolve_direct(&[], &[1.0]).is_empty());
        assert!(convolve_direct(&[1.0], &[]).is_empty());
    }
}
