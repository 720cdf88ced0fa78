//! SVG to PNG rasterization.

use super::ChartError;

/// Rasterize SVG markup to PNG bytes at the given canvas size.
pub fn rasterize(svg: &str, width: u32, height: u32) -> Result<Vec<u8>, ChartError> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_data(svg.as_bytes(), &options)
        .map_err(|e| ChartError::Svg(format!("{e:?}")))?;

    let mut pixmap =
        tiny_skia::Pixmap::new(width, height).ok_or(ChartError::Pixmap { width, height })?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.write_header()?.write_image_data(pixmap.data())?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_SVG: &str =
        "<svg xmlns='http://www.w3.org/2000/svg' width='40' height='20'>\
         <rect width='40' height='20' fill='#2E86DE'/></svg>";

    #[test]
    fn test_rasterize_produces_png() {
        let bytes = rasterize(MINIMAL_SVG, 40, 20).unwrap();
        // PNG signature
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n']);
    }

    #[test]
    fn test_rasterize_is_deterministic() {
        let first = rasterize(MINIMAL_SVG, 40, 20).unwrap();
        let second = rasterize(MINIMAL_SVG, 40, 20).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_svg_is_an_error() {
        let err = rasterize("<svg", 40, 20).unwrap_err();
        assert!(matches!(err, ChartError::Svg(_)));
    }
}
