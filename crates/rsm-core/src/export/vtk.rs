use super::{format_fixed_f64, write_text_artifact};
use crate::domain::{HklAxis, RsmError, RsmResult};
use crate::gridding::GriddedVolume;
use std::fmt::Write as _;
use std::path::Path;

const COORDINATE_PRECISION: usize = 8;
const VALUES_PER_LINE: usize = 6;

/// Legacy ASCII VTK `RECTILINEAR_GRID`. X, Y and Z are H, K and L; the
/// `intensity` point data is written with H varying fastest, then K, then L.
pub fn render_vtk_rectilinear(volume: &GriddedVolume, title: &str) -> String {
    let (h_n, k_n, l_n) = volume.shape();
    let mut out = String::new();
    // fmt::Write into a String cannot fail
    let _ = writeln!(out, "# vtk DataFile Version 3.0");
    let _ = writeln!(out, "{}", single_line(title));
    let _ = writeln!(out, "ASCII");
    let _ = writeln!(out, "DATASET RECTILINEAR_GRID");
    let _ = writeln!(out, "DIMENSIONS {} {} {}", h_n, k_n, l_n);

    for (axis, label) in HklAxis::ALL.into_iter().zip(["X", "Y", "Z"]) {
        let coords = volume.coordinates(axis);
        let _ = writeln!(out, "{}_COORDINATES {} double", label, coords.len());
        write_values(&mut out, coords.iter().copied());
    }

    let _ = writeln!(out, "POINT_DATA {}", h_n * k_n * l_n);
    let _ = writeln!(out, "SCALARS intensity double 1");
    let _ = writeln!(out, "LOOKUP_TABLE default");
    let values = (0..l_n).flat_map(move |l| {
        (0..k_n).flat_map(move |k| (0..h_n).map(move |h| volume.value(h, k, l)))
    });
    write_values(&mut out, values);
    out
}

pub fn write_vtk_rectilinear(volume: &GriddedVolume, title: &str, path: &Path) -> RsmResult<()> {
    write_text_artifact(path, &render_vtk_rectilinear(volume, title)).map_err(|error| {
        RsmError::io_system(
            "IO.EXPORT_WRITE",
            format!("failed to write '{}': {}", path.display(), error),
        )
    })
}

fn write_values(out: &mut String, values: impl Iterator<Item = f64>) {
    let mut column = 0;
    for value in values {
        if column > 0 {
            out.push(' ');
        }
        out.push_str(&format_fixed_f64(value, COORDINATE_PRECISION));
        column += 1;
        if column == VALUES_PER_LINE {
            out.push('\n');
            column = 0;
        }
    }
    if column > 0 {
        out.push('\n');
    }
}

fn single_line(title: &str) -> String {
    let line: String = title.lines().next().unwrap_or_default().chars().take(255).collect();
    if line.is_empty() {
        "gridded reciprocal-space volume".to_string()
    } else {
        line
    }
}
