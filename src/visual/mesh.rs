//! Geodesic icosphere used as the base shape.

use glam::Vec3;
use std::collections::{HashMap, HashSet};

const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
    [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
    [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
    [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
];

/// Unit-normal sphere mesh with a wireframe edge list.
#[derive(Clone, Debug)]
pub struct Icosphere {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub edges: Vec<[u32; 2]>,
}

impl Icosphere {
    /// Each icosahedron edge is split into `detail + 1` segments and every
    /// vertex is projected onto the sphere.
    pub fn new(radius: f32, detail: u32) -> Self {
        let t = (1.0 + 5.0f32.sqrt()) / 2.0;
        let corners = [
            Vec3::new(-1.0, t, 0.0),
            Vec3::new(1.0, t, 0.0),
            Vec3::new(-1.0, -t, 0.0),
            Vec3::new(1.0, -t, 0.0),
            Vec3::new(0.0, -1.0, t),
            Vec3::new(0.0, 1.0, t),
            Vec3::new(0.0, -1.0, -t),
            Vec3::new(0.0, 1.0, -t),
            Vec3::new(t, 0.0, -1.0),
            Vec3::new(t, 0.0, 1.0),
            Vec3::new(-t, 0.0, -1.0),
            Vec3::new(-t, 0.0, 1.0),
        ];

        let n = detail as usize + 1;
        let mut builder = MeshBuilder::default();

        for face in ICOSAHEDRON_FACES {
            // grid[i][j]: i steps toward the third corner, j toward the second
            let mut grid: Vec<Vec<u32>> = Vec::with_capacity(n + 1);
            for i in 0..=n {
                let mut row = Vec::with_capacity(n + 1 - i);
                for j in 0..=n - i {
                    let weights = [(face[0], n - i - j), (face[1], j), (face[2], i)];
                    row.push(builder.vertex(&corners, weights, n, radius));
                }
                grid.push(row);
            }

            for i in 0..n {
                for j in 0..n - i {
                    builder.triangle(grid[i][j], grid[i][j + 1], grid[i + 1][j]);
                    if j + 1 < n - i {
                        builder.triangle(grid[i][j + 1], grid[i + 1][j + 1], grid[i + 1][j]);
                    }
                }
            }
        }

        builder.finish()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[derive(Default)]
struct MeshBuilder {
    positions: Vec<Vec3>,
    lookup: HashMap<Vec<(usize, usize)>, u32>,
    edges: Vec<[u32; 2]>,
    seen_edges: HashSet<[u32; 2]>,
}

impl MeshBuilder {
    /// Vertices are keyed by their integer barycentric weights over corner
    /// ids, so points on shared edges collapse exactly.
    fn vertex(&mut self, corners: &[Vec3; 12], weights: [(usize, usize); 3], n: usize, radius: f32) -> u32 {
        let mut key: Vec<(usize, usize)> = weights.into_iter().filter(|&(_, w)| w > 0).collect();
        key.sort_unstable();

        if let Some(&idx) = self.lookup.get(&key) {
            return idx;
        }

        let p = key
            .iter()
            .fold(Vec3::ZERO, |acc, &(corner, w)| acc + corners[corner] * (w as f32 / n as f32));
        let idx = self.positions.len() as u32;
        self.positions.push(p.normalize() * radius);
        self.lookup.insert(key, idx);
        idx
    }

    fn triangle(&mut self, a: u32, b: u32, c: u32) {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            let edge = [u.min(v), u.max(v)];
            if self.seen_edges.insert(edge) {
                self.edges.push(edge);
            }
        }
    }

    fn finish(self) -> Icosphere {
        let normals = self.positions.iter().map(|p| p.normalize_or_zero()).collect();
        Icosphere {
            positions: self.positions,
            normals,
            edges: self.edges,
        }
    }
}
