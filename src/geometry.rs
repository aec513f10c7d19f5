use std::f32::consts::PI;

/// Build parameters for the sphere row.
#[derive(Clone, Copy, Debug)]
pub struct SphereGridParams {
    pub latitude_bands: u32,
    pub longitude_bands: u32,
    pub radius: f32,
    pub instance_count: u32,
    /// Spacing between consecutive spheres along X.
    pub instance_offset: f32,
}

impl Default for SphereGridParams {
    fn default() -> Self {
        Self {
            latitude_bands: 150,
            longitude_bands: 150,
            radius: 1.0,
            instance_count: 4,
            instance_offset: 6.0,
        }
    }
}

/// CPU-side mesh data for every sphere in the row, generated once at startup.
///
/// Positions carry the per-instance X offset baked in; normals are the unit
/// sphere direction and therefore repeat identically for every instance.
/// The strip indices also repeat the same zig-zag pattern per instance
/// (the offset lives in the view matrix, never in the indices), so draw
/// calls only ever touch the first `instance_index_count()` entries.
pub struct SphereGrid {
    pub params: SphereGridParams,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub strip_indices: Vec<u32>,
}

impl SphereGrid {
    pub fn generate(params: SphereGridParams) -> Self {
        let lat = params.latitude_bands;
        let lon = params.longitude_bands;

        let vertex_total = (params.instance_count * (lat + 1) * (lon + 1)) as usize;
        let mut positions = Vec::with_capacity(vertex_total);
        let mut normals = Vec::with_capacity(vertex_total);
        let mut strip_indices = Vec::new();

        for instance in 0..params.instance_count {
            let x0 = instance as f32 * params.instance_offset;

            for i in 0..=lat {
                let theta = i as f32 * PI / lat as f32;
                let (sin_theta, cos_theta) = theta.sin_cos();

                for j in 0..=lon {
                    let phi = j as f32 * 2.0 * PI / lon as f32;
                    let (sin_phi, cos_phi) = phi.sin_cos();

                    let nx = cos_phi * sin_theta;
                    let ny = cos_theta;
                    let nz = sin_phi * sin_theta;

                    positions.push([
                        x0 + params.radius * nx,
                        params.radius * ny,
                        params.radius * nz,
                    ]);
                    normals.push([nx, ny, nz]);
                }
            }

            for i in 0..lat {
                let start = i * (lon + 1);
                let next = (i + 1) * (lon + 1);
                for j in 0..=lon {
                    strip_indices.push(start + j);
                    strip_indices.push(next + j);
                }
                // Close the band back onto its first column.
                strip_indices.push(start);
                strip_indices.push(next);
            }
        }

        Self {
            params,
            positions,
            normals,
            strip_indices,
        }
    }

    /// Vertices per sphere.
    pub fn instance_vertex_count(&self) -> u32 {
        (self.params.latitude_bands + 1) * (self.params.longitude_bands + 1)
    }

    /// Strip entries covering one sphere; the range every draw call uses.
    pub fn instance_index_count(&self) -> u32 {
        self.params.latitude_bands * ((self.params.longitude_bands + 1) * 2 + 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn params(lat: u32, lon: u32, count: u32) -> SphereGridParams {
        SphereGridParams {
            latitude_bands: lat,
            longitude_bands: lon,
            instance_count: count,
            ..SphereGridParams::default()
        }
    }

    #[test]
    fn vertex_count_matches_the_band_grid() {
        for &(lat, lon, count) in &[(1, 1, 1), (3, 5, 2), (16, 16, 4), (150, 150, 4)] {
            let grid = SphereGrid::generate(params(lat, lon, count));
            let expected = (count * (lat + 1) * (lon + 1)) as usize;
            assert_eq!(grid.positions.len(), expected);
            assert_eq!(grid.normals.len(), expected);
            assert_eq!(grid.instance_vertex_count(), (lat + 1) * (lon + 1));
        }
    }

    #[test]
    fn normals_have_unit_length() {
        for &(lat, lon) in &[(1, 1), (2, 3), (16, 16)] {
            let grid = SphereGrid::generate(params(lat, lon, 2));
            for n in &grid.normals {
                let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
                assert!((len - 1.0).abs() < EPS, "normal {n:?} has length {len}");
            }
        }
    }

    #[test]
    fn index_count_is_deterministic() {
        for &(lat, lon, count) in &[(1, 1, 1), (4, 7, 3), (16, 16, 4)] {
            let grid = SphereGrid::generate(params(lat, lon, count));
            let per_instance = lat * ((lon + 1) * 2 + 2);
            assert_eq!(grid.instance_index_count(), per_instance);
            assert_eq!(grid.strip_indices.len(), (count * per_instance) as usize);
        }
    }

    #[test]
    fn draw_range_stays_inside_one_instance() {
        let grid = SphereGrid::generate(params(16, 16, 4));
        let range = &grid.strip_indices[..grid.instance_index_count() as usize];
        let max = range.iter().copied().max().unwrap();
        assert!(max < grid.instance_vertex_count());
    }

    #[test]
    fn instances_are_offset_copies_along_x() {
        let p = params(8, 8, 3);
        let grid = SphereGrid::generate(p);
        let per = grid.instance_vertex_count() as usize;
        for instance in 1..p.instance_count as usize {
            for k in 0..per {
                let a = grid.positions[k];
                let b = grid.positions[instance * per + k];
                let expected_x = a[0] + instance as f32 * p.instance_offset;
                assert!((b[0] - expected_x).abs() < EPS);
                assert!((b[1] - a[1]).abs() < EPS);
                assert!((b[2] - a[2]).abs() < EPS);
                assert_eq!(grid.normals[k], grid.normals[instance * per + k]);
            }
        }
    }

    #[test]
    fn positions_sit_on_the_sphere_surface() {
        let p = SphereGridParams {
            radius: 2.5,
            ..params(6, 9, 2)
        };
        let grid = SphereGrid::generate(p);
        let per = grid.instance_vertex_count() as usize;
        for (k, pos) in grid.positions.iter().enumerate() {
            let x0 = (k / per) as f32 * p.instance_offset;
            let local = [pos[0] - x0, pos[1], pos[2]];
            let dist = (local[0] * local[0] + local[1] * local[1] + local[2] * local[2]).sqrt();
            assert!((dist - p.radius).abs() < 1e-4);
        }
    }
}
