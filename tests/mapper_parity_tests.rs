//! Mapping parity and byte-exact orientation vectors.

use dotpace::config::{
    CanvasSize, DisplayConfig, Orientation, Origin, PanelConfig, PanelSize, RuntimeConfig,
    SerialConfig,
};
use dotpace::mapper::{self, test_pattern, Bitmap, TestPattern};

fn config(panels: Vec<PanelConfig>, width: u16, height: u16) -> DisplayConfig {
    DisplayConfig {
        canvas: CanvasSize { width, height },
        panels,
        serial: SerialConfig::default(),
        runtime: RuntimeConfig::default(),
    }
}

fn panel(id: &str, address: u8, x: u16, y: u16, w: u16, orientation: Orientation) -> PanelConfig {
    PanelConfig {
        id: id.to_string(),
        address,
        origin: Origin { x, y },
        size: PanelSize { w, h: 7 },
        orientation,
    }
}

#[test]
fn test_rot180_checkerboard_with_row_marker_hand_vector() {
    // 28x7 canvas, one rot180 panel. Checkerboard plus a marker: the top
    // row's first four pixels lit.
    let cfg = config(vec![panel("p", 0, 0, 0, 28, Orientation::Rot180)], 28, 7);

    let mut canvas = test_pattern(
        &CanvasSize {
            width: 28,
            height: 7,
        },
        TestPattern::Checkerboard,
    );
    for x in 0..4 {
        canvas.set(x, 0, true);
    }

    let mapped = mapper::map(&canvas, &cfg).unwrap();
    let columns = &mapped[0].columns;

    // Checkerboard under rot180: output column x, row y corresponds to
    // canvas pixel (27-x, 6-y); parity (27-x + 6-y) % 2 == (x + y + 1) % 2.
    // So even output columns carry rows 1,3,5 -> 0b0101010; odd columns
    // carry rows 0,2,4,6 -> 0b1010101.
    // The marker (x<4, y=0 on canvas) lands in output columns 24..28 at
    // row 6, adding bit 6 where the checkerboard left it clear.
    for (x, &byte) in columns.iter().enumerate() {
        let board = if x % 2 == 0 { 0b010_1010 } else { 0b101_0101 };
        let marker = if x >= 24 && x % 2 == 0 { 0b100_0000 } else { 0 };
        assert_eq!(byte, board | marker, "column {x}");
    }
}

#[test]
fn test_top_stripe_rot180_moves_to_bit_six() {
    let cfg = config(vec![panel("p", 0, 0, 0, 28, Orientation::Rot180)], 28, 7);
    let mut canvas = Bitmap::zeroed(28, 7);
    for x in 0..28 {
        canvas.set(x, 0, true);
    }

    let mapped = mapper::map(&canvas, &cfg).unwrap();
    assert!(mapped[0].columns.iter().all(|&b| b == 0b0100_0000));
}

#[test]
fn test_mapping_parity_multi_panel_mixed_orientations() {
    // 2x2 grid of 7x7 panels, every orientation family represented
    let cfg = config(
        vec![
            panel("nw", 0, 0, 0, 7, Orientation::Normal),
            panel("ne", 1, 7, 0, 7, Orientation::Rot90),
            panel("sw", 2, 0, 7, 7, Orientation::FlipH),
            panel("se", 3, 7, 7, 7, Orientation::Rot270),
        ],
        14,
        14,
    );

    for pattern in [
        TestPattern::Checkerboard,
        TestPattern::Border,
        TestPattern::Solid,
    ] {
        let canvas = test_pattern(
            &CanvasSize {
                width: 14,
                height: 14,
            },
            pattern,
        );
        let mapped = mapper::map(&canvas, &cfg).unwrap();
        let restored = mapper::unmap(&mapped, &cfg);
        assert_eq!(restored, canvas, "parity broken for {pattern:?}");
    }
}

#[test]
fn test_parity_ignores_uncovered_pixels() {
    // panel covers only the left half; right-half pixels are don't-care
    let cfg = config(vec![panel("left", 0, 0, 0, 14, Orientation::Normal)], 28, 7);

    let mut canvas = Bitmap::zeroed(28, 7);
    canvas.set(2, 2, true); // covered
    canvas.set(20, 3, true); // uncovered

    let mapped = mapper::map(&canvas, &cfg).unwrap();
    let restored = mapper::unmap(&mapped, &cfg);

    assert!(restored.get(2, 2));
    assert!(!restored.get(20, 3));
}

#[test]
fn test_map_is_deterministic() {
    let cfg = config(
        vec![
            panel("a", 0, 0, 0, 14, Orientation::FlipV),
            panel("b", 1, 14, 0, 14, Orientation::Rot180),
        ],
        28,
        7,
    );
    let canvas = test_pattern(
        &CanvasSize {
            width: 28,
            height: 7,
        },
        TestPattern::Border,
    );

    let first = mapper::map(&canvas, &cfg).unwrap();
    for _ in 0..10 {
        assert_eq!(mapper::map(&canvas, &cfg).unwrap(), first);
    }
}

#[test]
fn test_width_one_panel_single_column() {
    // degenerate 1-wide crop still folds to one byte with bit 7 clear
    let cfg = config(vec![panel("p", 0, 0, 0, 7, Orientation::Normal)], 7, 7);
    let canvas = Bitmap::filled(7, 7);

    let mapped = mapper::map(&canvas, &cfg).unwrap();
    assert_eq!(mapped[0].columns.len(), 7);
    assert!(mapped[0].columns.iter().all(|&b| b == 0x7F));
}
