use std::io::Write;

use log::info;

use crate::{
    analysis::PlateSolution,
    derived::{triangle_area, triangle_quality},
    error::{FemError, Result},
};

fn create(path: &str) -> Result<std::fs::File> {
    std::fs::File::create(path)
        .map_err(|err| FemError::PostProcessor(format!("Failed to create {path}: {err}")))
}

fn write_line(file: &mut std::fs::File, path: &str, line: String) -> Result<()> {
    file.write_all(line.as_bytes())
        .map_err(|err| FemError::PostProcessor(format!("Failed to write {path}: {err}")))
}

/// Writes plate results to two CSV files
///
/// # Arguments
/// * `solution` - The solved plate model
/// * `nodes_output` - The filename of the output nodes csv
/// * `elements_output` - The filename of the output elements csv
pub fn csv_output(solution: &PlateSolution, nodes_output: &str, elements_output: &str) -> Result<()> {
    let mut nodes_file = create(nodes_output)?;
    let mut elements_file = create(elements_output)?;

    // Write nodes
    write_line(&mut nodes_file, nodes_output, "x,y,w,theta_x,theta_y\n".to_owned())?;
    for (i, node) in solution.mesh.nodes.iter().enumerate() {
        let [w, theta_x, theta_y] = solution.node_displacements(i);
        write_line(
            &mut nodes_file,
            nodes_output,
            format!(
                "{x},{y},{w},{theta_x},{theta_y}\n",
                x = node.x,
                y = node.y
            ),
        )?;
    }

    // Write elements
    write_line(&mut elements_file, elements_output, "n0,n1,n2,area,quality\n".to_owned())?;
    for element in &solution.mesh.elements {
        let [n0, n1, n2] = element.nodes;
        let (p0, p1, p2) = (
            solution.mesh.nodes[n0],
            solution.mesh.nodes[n1],
            solution.mesh.nodes[n2],
        );
        write_line(
            &mut elements_file,
            elements_output,
            format!(
                "{n0},{n1},{n2},{area},{quality}\n",
                area = triangle_area(p0, p1, p2),
                quality = triangle_quality(p0, p1, p2)
            ),
        )?;
    }

    info!("wrote output to {} and {}", nodes_output, elements_output);

    Ok(())
}
