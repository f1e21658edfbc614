use std::iter;

use crate::{Real, INF};

/// ASCII plot of a sequence of positive values.
///
/// Draw each point as a column filled with '*'s up to the maximum height.
pub fn render_vbars(values: &[Real], height: usize) -> String {
    let finite: Vec<Real> = values.iter().map(|x| if x.is_finite() { *x } else { 0.0 }).collect();
    let max = finite.iter().cloned().fold(-INF, |x, y| x.max(y));
    if finite.is_empty() || !(max > 0.0) || height == 0 {
        return String::new();
    }
    let step = max / height as Real;

    let mut out = String::with_capacity((values.len() + 1) * (height + 1));
    for i in 0..height {
        let h = (height - i) as Real * step;
        out.extend(finite.iter().map(|&x| if x >= h { '*' } else { ' ' }));
        out.push('\n');
    }
    out.extend(iter::repeat('-').take(finite.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_reach_expected_height() {
        let plot = render_vbars(&[1.0, 2.0, 4.0], 4);
        let lines: Vec<&str> = plot.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "  *");
        assert_eq!(lines[2], " **");
        assert_eq!(lines[3], "***");
        assert_eq!(lines[4], "---");
        assert_eq!(render_vbars(&[], 3), "");
    }
}
