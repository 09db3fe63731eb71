// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Scanline-free triangle rasterizer used by the software device.
//!
//! Triangles arrive in clip space with a `[0, 1]` depth range. They are
//! clipped against the near plane, divided by `w`, mapped to the viewport
//! with `y` pointing down, and filled by testing edge functions at pixel
//! centres. Both windings are filled. Pixel centres lying exactly on an edge
//! follow the top-left rule, so triangles sharing an edge never both cover
//! the same pixel. Depth uses the `Less` comparison.

use tricull_core::math::Vec4;

/// The attachments a triangle is written into.
pub(crate) struct RasterTarget<'a> {
    pub width: u32,
    pub height: u32,
    pub color: &'a mut [u32],
    /// Depth texels stored as `f32` bits.
    pub depth: Option<&'a mut [u32]>,
}

#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
}

/// Sutherland-Hodgman against `z >= 0`, which also keeps `w > 0` for a
/// perspective projection.
fn clip_near(triangle: [Vec4; 3]) -> Vec<Vec4> {
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let a = triangle[i];
        let b = triangle[(i + 1) % 3];
        let a_in = a.z >= 0.0;
        let b_in = b.z >= 0.0;
        if a_in {
            out.push(a);
        }
        if a_in != b_in {
            let t = a.z / (a.z - b.z);
            out.push(Vec4::lerp(a, b, t));
        }
    }
    out
}

fn to_screen(v: Vec4, width: u32, height: u32) -> Option<ScreenVertex> {
    if v.w <= f32::EPSILON {
        return None;
    }
    let inv_w = 1.0 / v.w;
    let (nx, ny, nz) = (v.x * inv_w, v.y * inv_w, v.z * inv_w);
    Some(ScreenVertex {
        x: (nx * 0.5 + 0.5) * width as f32,
        y: (0.5 - ny * 0.5) * height as f32,
        z: nz,
    })
}

fn edge(a: ScreenVertex, b: ScreenVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Whether the edge `a -> b` is a top or left edge of a triangle whose signed
/// area is `area`. The interior lies along `(-dy, dx) / area`.
fn is_top_left(a: ScreenVertex, b: ScreenVertex, area: f32) -> bool {
    let nx = -(b.y - a.y) / area;
    let ny = (b.x - a.x) / area;
    nx > 0.0 || (nx == 0.0 && ny > 0.0)
}

fn inside(weight: f32, owns_edge: bool) -> bool {
    weight > 0.0 || (weight == 0.0 && owns_edge)
}

/// Rasterizes one clip-space triangle, writing `value` to every covered pixel
/// that passes the depth test. Returns the number of pixels written.
pub(crate) fn draw_triangle(target: &mut RasterTarget<'_>, clip: [Vec4; 3], value: u32) -> usize {
    let polygon = clip_near(clip);
    if polygon.len() < 3 {
        return 0;
    }
    let Some(screen) = polygon
        .iter()
        .map(|&v| to_screen(v, target.width, target.height))
        .collect::<Option<Vec<_>>>()
    else {
        return 0;
    };

    let mut written = 0;
    for i in 1..screen.len() - 1 {
        written += fill(target, [screen[0], screen[i], screen[i + 1]], value);
    }
    written
}

fn fill(target: &mut RasterTarget<'_>, tri: [ScreenVertex; 3], value: u32) -> usize {
    let [a, b, c] = tri;
    let area = edge(a, b, c.x, c.y);
    if area.abs() <= f32::EPSILON {
        return 0;
    }

    let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as u32;
    let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as u32;
    let max_x = (a.x.max(b.x).max(c.x).ceil().max(0.0) as u32).min(target.width);
    let max_y = (a.y.max(b.y).max(c.y).ceil().max(0.0) as u32).min(target.height);

    let owns = [
        is_top_left(b, c, area),
        is_top_left(c, a, area),
        is_top_left(a, b, area),
    ];

    let mut written = 0;
    for y in min_y..max_y {
        for x in min_x..max_x {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b, c, px, py) / area;
            let w1 = edge(c, a, px, py) / area;
            let w2 = edge(a, b, px, py) / area;
            if !(inside(w0, owns[0]) && inside(w1, owns[1]) && inside(w2, owns[2])) {
                continue;
            }
            let z = w0 * a.z + w1 * b.z + w2 * c.z;
            if !(0.0..=1.0).contains(&z) {
                continue;
            }

            let index = (y * target.width + x) as usize;
            if let Some(depth) = target.depth.as_deref_mut() {
                if z >= f32::from_bits(depth[index]) {
                    continue;
                }
                depth[index] = z.to_bits();
            }
            target.color[index] = value;
            written += 1;
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(clip: [Vec4; 3], color: &mut [u32], depth: &mut [u32], value: u32) -> usize {
        let mut target = RasterTarget {
            width: 8,
            height: 8,
            color,
            depth: Some(depth),
        };
        draw_triangle(&mut target, clip, value)
    }

    fn cleared() -> (Vec<u32>, Vec<u32>) {
        (vec![0; 64], vec![1.0f32.to_bits(); 64])
    }

    fn big_triangle(z: f32) -> [Vec4; 3] {
        [
            Vec4::new(-3.0, -3.0, z, 1.0),
            Vec4::new(3.0, -3.0, z, 1.0),
            Vec4::new(0.0, 3.0, z, 1.0),
        ]
    }

    #[test]
    fn covering_triangle_fills_centre_in_both_windings() {
        let (mut color, mut depth) = cleared();
        assert!(run(big_triangle(0.5), &mut color, &mut depth, 7) > 0);
        assert_eq!(color[4 * 8 + 4], 7);

        let [a, b, c] = big_triangle(0.5);
        let (mut color, mut depth) = cleared();
        run([a, c, b], &mut color, &mut depth, 9);
        assert_eq!(color[4 * 8 + 4], 9);
    }

    #[test]
    fn nearer_triangle_wins_regardless_of_order() {
        let (mut color, mut depth) = cleared();
        run(big_triangle(0.2), &mut color, &mut depth, 1);
        run(big_triangle(0.6), &mut color, &mut depth, 2);
        assert_eq!(color[4 * 8 + 4], 1);
    }

    #[test]
    fn triangle_behind_near_plane_is_discarded() {
        let (mut color, mut depth) = cleared();
        let behind = [
            Vec4::new(-1.0, -1.0, -0.5, -1.0),
            Vec4::new(1.0, -1.0, -0.5, -1.0),
            Vec4::new(0.0, 1.0, -0.5, -1.0),
        ];
        assert_eq!(run(behind, &mut color, &mut depth, 3), 0);
        assert!(color.iter().all(|&c| c == 0));
    }

    #[test]
    fn shared_diagonal_is_covered_exactly_once() {
        // Both halves of a full-viewport quad; the diagonal runs through the
        // centres of pixels (i, i).
        let corners = [
            Vec4::new(-1.0, 1.0, 0.5, 1.0),
            Vec4::new(1.0, 1.0, 0.5, 1.0),
            Vec4::new(1.0, -1.0, 0.5, 1.0),
            Vec4::new(-1.0, -1.0, 0.5, 1.0),
        ];
        let mut color = vec![0u32; 64];
        let mut target = RasterTarget {
            width: 8,
            height: 8,
            color: &mut color,
            depth: None,
        };
        let upper = draw_triangle(&mut target, [corners[0], corners[1], corners[2]], 1);
        let lower = draw_triangle(&mut target, [corners[0], corners[2], corners[3]], 2);
        assert_eq!(upper + lower, 64);
        assert!(color.iter().all(|&c| c != 0));
    }

    #[test]
    fn straddling_triangle_is_clipped_not_dropped() {
        let (mut color, mut depth) = cleared();
        let straddling = [
            Vec4::new(-2.0, -2.0, 0.5, 1.0),
            Vec4::new(2.0, -2.0, 0.5, 1.0),
            Vec4::new(0.0, 2.0, -1.0, 1.0),
        ];
        assert!(run(straddling, &mut color, &mut depth, 4) > 0);
    }
}
