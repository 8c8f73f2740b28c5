/// Fits `input` into the `target` bound, keeping the aspect ratio.
///
/// Sources already inside the bound are returned untouched (no upscaling).
/// Otherwise both sides are scaled by the tighter ratio, rounded, then bumped
/// up to the next even number so 4:2:0 chroma subsampling stays valid. A bump
/// that would cross an odd bound steps down instead, and no side drops below
/// 2 pixels.
pub fn fit(input_width: u32, input_height: u32, target_width: u32, target_height: u32) -> (u32, u32) {
    if input_width <= target_width && input_height <= target_height {
        return (input_width, input_height);
    }
    if input_width == 0 || input_height == 0 || target_width == 0 || target_height == 0 {
        return (input_width, input_height);
    }

    let width_ratio = target_width as f64 / input_width as f64;
    let height_ratio = target_height as f64 / input_height as f64;
    let scale = width_ratio.min(height_ratio);

    let out_width = (input_width as f64 * scale).round() as u32;
    let out_height = (input_height as f64 * scale).round() as u32;

    (
        even_within(out_width, target_width),
        even_within(out_height, target_height),
    )
}

fn even_within(d: u32, bound: u32) -> u32 {
    let even = (d + 1) & !1;
    let even = if even > bound { d & !1 } else { even };
    even.max(MIN_SIDE)
}

const MIN_SIDE: u32 = 2;
