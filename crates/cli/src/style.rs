use colored::Color;

/// A stable label color for a task or group name
pub fn label_color(name: &str) -> Color {
    let hash = name
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));

    // Kept clear of the red/green used for failure and success markers
    let colors = [
        Color::TrueColor {
            r: 147,
            g: 112,
            b: 219,
        },
        Color::TrueColor {
            r: 64,
            g: 224,
            b: 208,
        },
        Color::TrueColor {
            r: 255,
            g: 140,
            b: 0,
        },
        Color::TrueColor {
            r: 199,
            g: 21,
            b: 133,
        },
        Color::TrueColor {
            r: 72,
            g: 209,
            b: 204,
        },
        Color::TrueColor {
            r: 138,
            g: 43,
            b: 226,
        },
    ];

    colors[(hash % colors.len() as u64) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_color() {
        assert_eq!(label_color("build-html"), label_color("build-html"));
    }

    #[test]
    fn palette_is_not_uniform() {
        let names = ["setup", "preprocess", "build", "view", "custom", "other"];
        let first = label_color(names[0]);
        assert!(names.iter().any(|n| label_color(n) != first));
    }
}
