use objglb_shared::nalgebra::Vector3;

/// RGB color with channels that are nominally in [0, 1]. Values are not clamped.
pub type ColorTriple = Vector3<f32>;

/// Color that is returned when a color line cannot be parsed.
pub const FALLBACK_COLOR: [f32; 3] = [0.8, 0.8, 0.8];

/// Parses whitespace separated channel values such as `"1.0 0.5 0.25"`.
///
/// Three or more numbers yield the first three channels and a single number is used for all
/// channels. Everything else results in [`FALLBACK_COLOR`].
///
/// # Example
///
/// ```
/// use objglb_content::color::parse_color;
/// assert_eq!(parse_color("0.5"), parse_color("0.5 0.5 0.5"));
/// assert_eq!(parse_color("red"), parse_color("0.8 0.8 0.8"));
/// ```
pub fn parse_color(text: &str) -> ColorTriple {
    let tokens = text.split_whitespace().collect::<Vec<_>>();
    let parsed = match tokens.as_slice() {
        [r, g, b, ..] => parse_channels(r, g, b),
        [value] => value.parse::<f32>().ok().map(|v| Vector3::new(v, v, v)),
        _ => None,
    };
    parsed.unwrap_or_else(|| Vector3::from(FALLBACK_COLOR))
}

fn parse_channels(r: &str, g: &str, b: &str) -> Option<ColorTriple> {
    Some(Vector3::new(r.parse().ok()?, g.parse().ok()?, b.parse().ok()?))
}
