//! Built-in rule text per animation category
//!
//! Rules are injected into code generation and repair prompts. Projects can
//! override any of them with a file in the rules directory.

use crate::models::Category;

/// Get the built-in rules for a category
pub fn default_rules(category: Category) -> &'static str {
    match category {
        Category::Graph2d => GRAPH2D,
        Category::Graph3d => GRAPH3D,
        Category::Physics => PHYSICS,
        Category::Statistics => STATISTICS,
        Category::ComputerDatastructure => COMPUTER_DATASTRUCTURE,
        Category::Text => TEXT,
    }
}

pub const GRAPH2D: &str = r#"# 2D Graph Scenes

## Known Errors
1. `get_axis_label()` does not accept `font_size`. Build the label first:
   `axes.get_x_axis_label(MathTex(r"x", font_size=28))`
2. Always pass raw strings to `MathTex`: `MathTex(r"f(x)")`.

## Font Sizes
Title 46, equations 36, labels 28, descriptions 24. Never exceed the title size.

## Layout
- Keep a 5% buffer from every frame edge.
- Show numbers with two decimal places (`num_decimal_places: 2`).
- When space runs out, fade out the equation before adding new elements.

## Order
Title, equation, axes, labels, graph, transformations.
"#;

pub const GRAPH3D: &str = r#"# 3D Graph Scenes

## Text
- Use `ThreeDScene`. There is no 3D text class: create 2D `Text`/`MathTex`.
- Call `self.add_fixed_in_frame_mobjects(...)` on every text object before
  any camera orientation or movement.
- Reserve the top 30% of the frame for fixed text; move surfaces below it.

## Camera
- Set the camera with `self.set_camera_orientation(phi=..., theta=...)`.
- Animate the camera with `self.move_camera(...)`, never `self.camera.animate`.

## Surfaces
- Use `Surface(lambda u, v: axes.c2p(...), u_range=..., v_range=...)`.
- Keep `resolution` at or below (32, 32) to bound render time.
"#;

pub const PHYSICS: &str = r#"# Physics Visualizations

## Font Sizes
Scale down with complexity. Simple: 48/36/28/24. Medium: 42/32/24/20. Complex: 36/28/22/18.

## Motion
- Drive continuous motion with `ValueTracker` and `always_redraw`.
- Keep simulations deterministic: no random seeds that change between runs.
- Show vectors with `Arrow` and label magnitude next to the tip.

## 3D
- Fix all text to the frame with `add_fixed_in_frame_mobjects` in 3D scenes.

## Frame
- Keep every object inside the frame with a 0.5 unit margin.
"#;

pub const STATISTICS: &str = r#"# Statistical Visualizations

## Known Errors
| Error | Fix |
|-------|-----|
| `TypeError: None in play()` | Check objects are not None before animating |
| Text rotates in 3D | `add_fixed_in_frame_mobjects(text)` |
| ThreeDCamera animate error | Use `self.move_camera()` |
| Bars exceed frame | Scale data to a `max_height` |

## Layout
- Chart area is 70% of the frame width and 60% of the height.
- Title at the top edge with `buff=0.2`, legend on the right.
- Format values with two decimal places.
"#;

pub const COMPUTER_DATASTRUCTURE: &str = r#"# Computer Data Structure Animations

## Frame
- Do not draw grids or crosshair lines.
- Check every mobject's bounding box against the frame with a 0.5 unit margin
  and shrink or move anything that would overflow.

## Structures
- Build nodes as `VGroup(Circle(...), Text(...))` and edges as `Line` between
  node borders, not centers.
- Highlight the active element with a color change, then restore it.
- Show the current step as a caption at the bottom edge.

## Pacing
- One operation per `self.play` call, `run_time` between 0.5 and 1.
"#;

pub const TEXT: &str = r#"# Text Animations

## Fonts
- Use `Text` for prose and `MathTex` (raw strings) for formulas.
- Title 48, body 32, footnotes 24.

## Layout
- Wrap long lines manually; never let text leave the frame.
- Arrange paragraphs with `VGroup(...).arrange(DOWN, aligned_edge=LEFT)`.
- Fade out a block before writing the next one in the same space.
"#;
