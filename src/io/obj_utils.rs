// Copyright @yucwang 2023

use crate::math::constants::{ Vector2f, Vector3f };

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use wavefront_obj::{ obj, ParseError };

#[derive(Debug)]
pub enum ObjLoadError {
    Io(std::io::Error),
    Parse(ParseError),
}

impl From<std::io::Error> for ObjLoadError {
    fn from(err: std::io::Error) -> Self {
        ObjLoadError::Io(err)
    }
}

impl From<ParseError> for ObjLoadError {
    fn from(err: ParseError) -> Self {
        ObjLoadError::Parse(err)
    }
}

impl fmt::Display for ObjLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjLoadError::Io(err) => write!(f, "io error: {}", err),
            ObjLoadError::Parse(err) => write!(f, "parse error: {}", err),
        }
    }
}

impl std::error::Error for ObjLoadError {}

pub fn load_obj_from_str<S: AsRef<str>>(input: S) -> Result<obj::ObjSet, ParseError> {
    let triangulated = triangulate_faces(input.as_ref());
    obj::parse(triangulated)
}

pub fn load_obj_from_file<P: AsRef<Path>>(path: P) -> Result<obj::ObjSet, ObjLoadError> {
    let data = fs::read_to_string(path)?;
    let obj_set = load_obj_from_str(data)?;
    Ok(obj_set)
}

type MeshBuffers = (Vec<Vector3f>, Vec<Vector3f>, Vec<Vector2f>, Vec<[u32; 3]>);

/// Flatten an OBJ file into unified per-vertex buffers: one vertex per
/// distinct (position, uv, normal) triple, indexed triangles.
pub fn load_mesh_buffers<P: AsRef<Path>>(path: P) -> Result<MeshBuffers, ObjLoadError> {
    let path_display = path.as_ref().display().to_string();
    let obj_set = load_obj_from_file(path)?;

    let mut verts = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut tris = Vec::new();

    for object in &obj_set.objects {
        // OBJ indices are scoped to their object.
        let mut remap: HashMap<(usize, Option<usize>, Option<usize>), u32> = HashMap::new();
        let mut resolve = |key: (usize, Option<usize>, Option<usize>)| -> u32 {
            let (vi, ti, ni) = key;
            *remap.entry((vi, ti, ni)).or_insert_with(|| {
                let v = &object.vertices[vi];
                verts.push(Vector3f::new(v.x as f32, v.y as f32, v.z as f32));
                if let Some(ti) = ti {
                    let t = &object.tex_vertices[ti];
                    uvs.push(Vector2f::new(t.u as f32, t.v as f32));
                } else {
                    uvs.push(Vector2f::new(0.0, 0.0));
                }
                if let Some(ni) = ni {
                    let n = &object.normals[ni];
                    normals.push(Vector3f::new(n.x as f32, n.y as f32, n.z as f32));
                } else {
                    normals.push(Vector3f::new(0.0, 0.0, 1.0));
                }
                (verts.len() - 1) as u32
            })
        };

        for geom in &object.geometry {
            for shape in &geom.shapes {
                if let obj::Primitive::Triangle(a, b, c) = shape.primitive {
                    tris.push([resolve(a), resolve(b), resolve(c)]);
                }
            }
        }
    }

    log::info!("loaded obj {}: {} vertices, {} triangles",
               path_display, verts.len(), tris.len());
    Ok((verts, normals, uvs, tris))
}

fn triangulate_faces(input: &str) -> String {
    // Fan-triangulate polygonal faces so the parser only sees triangles.
    let mut out = String::with_capacity(input.len() + input.len() / 4);
    for line in input.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("f ") || trimmed.starts_with("f\t") {
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() > 4 {
                let base = parts[1];
                for i in 2..(parts.len() - 1) {
                    out.push_str("f ");
                    out.push_str(base);
                    out.push(' ');
                    out.push_str(parts[i]);
                    out.push(' ');
                    out.push_str(parts[i + 1]);
                    out.push('\n');
                }
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
