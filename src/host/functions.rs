use nalgebra::DVector;

use super::{
    ArgError, ArgType, ComplexScalar, FunctionInfo, HostArg, HostBuffer, HostMatrix, HostResult,
    HostServices, HostValue,
};
use crate::{
    datatypes::{BeamSection, FrameSection, IndexBase, PlateMaterial, Vertex},
    derived::{
        cantilever_deflection, cantilever_rotation, clamped_plate_deflection, triangle_area,
        triangle_centroid, triangle_quality,
    },
    error::FemError,
    mesher::{
        check_dimension, rect_grid_counts, rect_node_iter, rect_triangle_iter,
        subdivisions_from_real,
    },
    solver::{solve_reduced, Constraints},
    stiffness::{
        beam2d_stiffness, frame3d_stiffness, plate_bending_stiffness, plate_shear_stiffness,
        plate_stiffness,
    },
};

const PLATE_PARAMS: &str = "x1,y1,x2,y2,x3,y3,E,nu,t";
const TRIANGLE_PARAMS: &str = "x1,y1,x2,y2,x3,y3";
const GRID_PARAMS: &str = "Lx,Ly,nx,ny";

/// Argument position of `name` in a comma separated parameter list, 1-based
fn param_position(params: &str, name: &str) -> usize {
    params
        .split(',')
        .position(|p| p == name)
        .map_or(0, |i| i + 1)
}

/// Tags a core error with the argument it names, if any
fn locate(error: FemError, params: &str) -> ArgError {
    let arg = match &error {
        FemError::MustBeReal(name) | FemError::MustBePositive(name) => param_position(params, name),
        _ => 0,
    };
    ArgError::at(error, arg)
}

fn check_arity(args: &[HostArg], count: usize) -> HostResult<()> {
    if args.len() != count {
        return Err(ArgError::at(
            FemError::InvalidParameter(format!("expected {count} arguments, got {}", args.len())),
            0,
        ));
    }
    Ok(())
}

fn scalar(args: &[HostArg], index: usize) -> HostResult<ComplexScalar> {
    match args.get(index) {
        Some(HostArg::Scalar(value)) => Ok(*value),
        _ => Err(ArgError::at(
            FemError::InvalidParameter(format!("argument {} must be a scalar", index + 1)),
            index + 1,
        )),
    }
}

fn array<'a>(args: &[HostArg<'a>], index: usize) -> HostResult<&'a HostMatrix> {
    match args.get(index) {
        Some(HostArg::Array(value)) => Ok(*value),
        _ => Err(ArgError::at(
            FemError::InvalidParameter(format!("argument {} must be an array", index + 1)),
            index + 1,
        )),
    }
}

/// Reads the real part of every scalar argument
fn real_parts(args: &[HostArg], count: usize) -> HostResult<Vec<f64>> {
    check_arity(args, count)?;
    (0..count).map(|i| scalar(args, i).map(|s| s.real)).collect()
}

/// Reads every scalar argument, rejecting nonzero imaginary parts
fn strict_reals(args: &[HostArg], params: &str) -> HostResult<Vec<f64>> {
    let names: Vec<&str> = params.split(',').collect();
    check_arity(args, names.len())?;

    let mut values = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let value = scalar(args, i)?;
        if value.imag != 0.0 {
            return Err(ArgError::at(FemError::MustBeReal((*name).to_owned()), i + 1));
        }
        values.push(value.real);
    }
    Ok(values)
}

fn subdivisions(value: f64, arg: usize) -> HostResult<usize> {
    subdivisions_from_real(value).map_err(|err| ArgError::at(err, arg))
}

/// Copies a core matrix into a freshly allocated host array
fn matrix_result<R, C, S>(
    host: &dyn HostServices,
    values: &nalgebra::Matrix<f64, R, C, S>,
) -> HostResult<HostValue>
where
    R: nalgebra::Dim,
    C: nalgebra::Dim,
    S: nalgebra::RawStorage<f64, R, C>,
{
    let mut buffer = HostBuffer::matrix(host, values.nrows(), values.ncols())?;
    buffer.copy_from(values);
    Ok(HostValue::Array(buffer.into_result()))
}

fn scalar_result(value: f64) -> HostResult<HostValue> {
    Ok(HostValue::Scalar(ComplexScalar::real(value)))
}

fn triangle(values: &[f64]) -> [Vertex; 3] {
    [
        Vertex {
            x: values[0],
            y: values[1],
        },
        Vertex {
            x: values[2],
            y: values[3],
        },
        Vertex {
            x: values[4],
            y: values[5],
        },
    ]
}

fn plate_inputs(args: &[HostArg]) -> HostResult<([Vertex; 3], PlateMaterial)> {
    let values = strict_reals(args, PLATE_PARAMS)?;
    let material = PlateMaterial {
        youngs_modulus: values[6],
        poisson_ratio: values[7],
        thickness: values[8],
    };
    Ok((triangle(&values), material))
}

/// `fem_beam_K(E, A, I, L)`
pub fn fem_beam_k(host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let values = real_parts(args, 4)?;
    let section = BeamSection {
        youngs_modulus: values[0],
        area: values[1],
        moment_of_inertia: values[2],
    };
    let k = beam2d_stiffness(&section, values[3]).map_err(|err| ArgError::at(err, 4))?;
    matrix_result(host, &k)
}

/// `fem_frame3d_K(E, G, A, Iy, Iz, J, L)`
pub fn fem_frame3d_k(host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let values = real_parts(args, 7)?;
    let section = FrameSection {
        youngs_modulus: values[0],
        shear_modulus: values[1],
        area: values[2],
        moment_of_inertia_y: values[3],
        moment_of_inertia_z: values[4],
        torsional_constant: values[5],
    };
    let k = frame3d_stiffness(&section, values[6]).map_err(|err| ArgError::at(err, 7))?;
    matrix_result(host, &k)
}

/// `fem_solve(K, F, supports)`, any nonzero support entry fixes that DOF
pub fn fem_solve(host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    check_arity(args, 3)?;
    let stiffness = array(args, 0)?;
    let loads = array(args, 1)?;
    let supports = array(args, 2)?;

    let n = stiffness.rows;
    if stiffness.cols != n || n == 0 {
        return Err(ArgError::at(
            FemError::InvalidParameter("K must be a non-empty square matrix".to_owned()),
            1,
        ));
    }
    if loads.rows != n || loads.cols < 1 {
        return Err(ArgError::at(
            FemError::InvalidParameter(format!("F must have {n} rows")),
            2,
        ));
    }

    // entries past the last DOF are ignored, missing entries are free
    let support_values: Vec<f64> = (0..supports.rows.min(n))
        .map(|row| supports.real_at(row, 0))
        .collect();
    let constraints = Constraints::from_supports(&support_values);

    let mut result = HostBuffer::matrix(host, n, 1)?;

    if host.user_interrupted() {
        return Err(FemError::Interrupted.into());
    }

    let load_vector = DVector::from_fn(n, |row, _| loads.real_at(row, 0));
    let displacements = solve_reduced(&stiffness.to_dmatrix(), &load_vector, &constraints)?;

    result.copy_from(&displacements);
    Ok(HostValue::Array(result.into_result()))
}

/// `cantilever_defl(P, L, E, I)`
pub fn cantilever_defl(_host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let v = real_parts(args, 4)?;
    scalar_result(cantilever_deflection(v[0], v[1], v[2], v[3])?)
}

/// `cantilever_rot(P, L, E, I)`
pub fn cantilever_rot(_host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let v = real_parts(args, 4)?;
    scalar_result(cantilever_rotation(v[0], v[1], v[2], v[3])?)
}

pub fn plate_kb(host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let (vertices, material) = plate_inputs(args)?;
    let k = plate_bending_stiffness(&vertices, &material).map_err(|e| locate(e, PLATE_PARAMS))?;
    matrix_result(host, &k)
}

pub fn plate_ks(host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let (vertices, material) = plate_inputs(args)?;
    let k = plate_shear_stiffness(&vertices, &material).map_err(|e| locate(e, PLATE_PARAMS))?;
    matrix_result(host, &k)
}

pub fn plate_k(host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let (vertices, material) = plate_inputs(args)?;
    let k = plate_stiffness(&vertices, &material).map_err(|e| locate(e, PLATE_PARAMS))?;
    matrix_result(host, &k)
}

/// `plate_defl(q, a, E, nu, t)`
pub fn plate_defl(_host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    const PARAMS: &str = "q,a,E,nu,t";
    let v = strict_reals(args, PARAMS)?;
    let w = clamped_plate_deflection(v[0], v[1], v[2], v[3], v[4]).map_err(|e| locate(e, PARAMS))?;
    scalar_result(w)
}

fn grid_inputs(args: &[HostArg]) -> HostResult<(f64, f64, usize, usize)> {
    let v = strict_reals(args, GRID_PARAMS)?;
    let nx = subdivisions(v[2], 3)?;
    let ny = subdivisions(v[3], 4)?;
    check_dimension("Lx", v[0]).map_err(|err| ArgError::at(err, 1))?;
    check_dimension("Ly", v[1]).map_err(|err| ArgError::at(err, 2))?;
    Ok((v[0], v[1], nx, ny))
}

/// Writes 1-based triangle connectivity as a `2·nx·ny` x 3 array
///
/// The host array is requested before any connectivity is generated.
fn connectivity_result(host: &dyn HostServices, nx: usize, ny: usize) -> HostResult<HostValue> {
    let (_, num_triangles) = rect_grid_counts(nx, ny)?;
    let mut buffer = HostBuffer::matrix(host, num_triangles, 3)?;

    for (row, element) in rect_triangle_iter(nx, ny, IndexBase::One)?.enumerate() {
        for (col, node) in element.nodes.iter().enumerate() {
            buffer.set_real(row, col, *node as f64);
        }
    }
    Ok(HostValue::Array(buffer.into_result()))
}

/// `tri_rect_mesh(Lx, Ly, nx, ny)`
pub fn tri_rect_mesh(host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let (_, _, nx, ny) = grid_inputs(args)?;
    connectivity_result(host, nx, ny)
}

/// `tri_nodes(Lx, Ly, nx, ny)`
pub fn tri_nodes(host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let (lx, ly, nx, ny) = grid_inputs(args)?;
    let (num_nodes, _) = rect_grid_counts(nx, ny)?;
    let mut buffer = HostBuffer::matrix(host, num_nodes, 2)?;

    for (row, node) in rect_node_iter(lx, ly, nx, ny)?.enumerate() {
        buffer.set_real(row, 0, node.x);
        buffer.set_real(row, 1, node.y);
    }
    Ok(HostValue::Array(buffer.into_result()))
}

/// `tri_elements(nx, ny)`
pub fn tri_elements(host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let v = strict_reals(args, "nx,ny")?;
    let nx = subdivisions(v[0], 1)?;
    let ny = subdivisions(v[1], 2)?;
    connectivity_result(host, nx, ny)
}

pub fn tri_area(_host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let [p1, p2, p3] = triangle(&strict_reals(args, TRIANGLE_PARAMS)?);
    scalar_result(triangle_area(p1, p2, p3))
}

pub fn tri_quality(_host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let [p1, p2, p3] = triangle(&strict_reals(args, TRIANGLE_PARAMS)?);
    scalar_result(triangle_quality(p1, p2, p3))
}

/// `tri_centroid(...)` as a 2 x 1 vector `[xc, yc]`
pub fn tri_centroid(host: &dyn HostServices, args: &[HostArg]) -> HostResult<HostValue> {
    let [p1, p2, p3] = triangle(&strict_reals(args, TRIANGLE_PARAMS)?);
    let centroid = triangle_centroid(p1, p2, p3);

    let mut buffer = HostBuffer::matrix(host, 2, 1)?;
    buffer.set_real(0, 0, centroid.x);
    buffer.set_real(1, 0, centroid.y);
    Ok(HostValue::Array(buffer.into_result()))
}

fn scalars(count: usize) -> Vec<ArgType> {
    vec![ArgType::ComplexScalar; count]
}

/// Descriptors of every plugin function, in registration order
pub fn function_infos() -> Vec<FunctionInfo> {
    vec![
        FunctionInfo {
            name: "fem_beam_K",
            params: "E,A,I,L",
            description: "Stiffness matrix 6x6 for 2D beam element",
            return_type: ArgType::ComplexArray,
            arg_types: scalars(4),
            function: fem_beam_k,
        },
        FunctionInfo {
            name: "fem_frame3d_K",
            params: "E,G,A,Iy,Iz,J,L",
            description: "Stiffness matrix 12x12 for 3D frame element",
            return_type: ArgType::ComplexArray,
            arg_types: scalars(7),
            function: fem_frame3d_k,
        },
        FunctionInfo {
            name: "fem_solve",
            params: "K,F,supports",
            description: "Solves K*U=F with the DOFs marked in supports fixed",
            return_type: ArgType::ComplexArray,
            arg_types: vec![ArgType::ComplexArray; 3],
            function: fem_solve,
        },
        FunctionInfo {
            name: "cantilever_defl",
            params: "P,L,E,I",
            description: "Cantilever tip deflection: P*L^3/(3*E*I)",
            return_type: ArgType::ComplexScalar,
            arg_types: scalars(4),
            function: cantilever_defl,
        },
        FunctionInfo {
            name: "cantilever_rot",
            params: "P,L,E,I",
            description: "Cantilever tip rotation: P*L^2/(2*E*I)",
            return_type: ArgType::ComplexScalar,
            arg_types: scalars(4),
            function: cantilever_rot,
        },
        FunctionInfo {
            name: "plate_Kb",
            params: PLATE_PARAMS,
            description: "Bending stiffness matrix (9x9) for triangular plate element",
            return_type: ArgType::ComplexArray,
            arg_types: scalars(9),
            function: plate_kb,
        },
        FunctionInfo {
            name: "plate_Ks",
            params: PLATE_PARAMS,
            description: "Shear stiffness matrix (9x9) for triangular plate element",
            return_type: ArgType::ComplexArray,
            arg_types: scalars(9),
            function: plate_ks,
        },
        FunctionInfo {
            name: "plate_K",
            params: PLATE_PARAMS,
            description: "Total stiffness matrix (9x9) for triangular plate element (bending + shear)",
            return_type: ArgType::ComplexArray,
            arg_types: scalars(9),
            function: plate_k,
        },
        FunctionInfo {
            name: "plate_defl",
            params: "q,a,E,nu,t",
            description: "Central deflection of clamped square plate under uniform load",
            return_type: ArgType::ComplexScalar,
            arg_types: scalars(5),
            function: plate_defl,
        },
        FunctionInfo {
            name: "tri_rect_mesh",
            params: GRID_PARAMS,
            description: "Generates triangular mesh connectivity for rectangle",
            return_type: ArgType::ComplexArray,
            arg_types: scalars(4),
            function: tri_rect_mesh,
        },
        FunctionInfo {
            name: "tri_nodes",
            params: GRID_PARAMS,
            description: "Generates node coordinates for rectangular triangular mesh",
            return_type: ArgType::ComplexArray,
            arg_types: scalars(4),
            function: tri_nodes,
        },
        FunctionInfo {
            name: "tri_elements",
            params: "nx,ny",
            description: "Generates triangular element connectivity for nx by ny grid",
            return_type: ArgType::ComplexArray,
            arg_types: scalars(2),
            function: tri_elements,
        },
        FunctionInfo {
            name: "tri_area",
            params: TRIANGLE_PARAMS,
            description: "Calculates the area of a triangle given vertex coordinates",
            return_type: ArgType::ComplexScalar,
            arg_types: scalars(6),
            function: tri_area,
        },
        FunctionInfo {
            name: "tri_quality",
            params: TRIANGLE_PARAMS,
            description: "Calculates triangle quality (1=equilateral, 0=degenerate)",
            return_type: ArgType::ComplexScalar,
            arg_types: scalars(6),
            function: tri_quality,
        },
        FunctionInfo {
            name: "tri_centroid",
            params: TRIANGLE_PARAMS,
            description: "Calculates triangle centroid [xc, yc]",
            return_type: ArgType::ComplexArray,
            arg_types: scalars(6),
            function: tri_centroid,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{buffer::tests::CountingHost, call, error_index};
    use approx::assert_relative_eq;

    fn reals(values: &[f64]) -> Vec<HostArg<'static>> {
        values
            .iter()
            .map(|v| HostArg::Scalar(ComplexScalar::real(*v)))
            .collect()
    }

    fn info(name: &str) -> FunctionInfo {
        function_infos()
            .into_iter()
            .find(|f| f.name == name)
            .unwrap()
    }

    fn unwrap_array(value: Option<HostValue>) -> HostMatrix {
        match value {
            Some(HostValue::Array(matrix)) => matrix,
            other => panic!("expected an array, got {other:?}"),
        }
    }

    fn unwrap_scalar(value: Option<HostValue>) -> f64 {
        match value {
            Some(HostValue::Scalar(s)) => s.real,
            other => panic!("expected a scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_descriptors_match_arity() {
        for info in function_infos() {
            assert_eq!(
                info.params.split(',').count(),
                info.arg_types.len(),
                "{}",
                info.name
            );
        }
    }

    #[test]
    fn test_beam_matrix() {
        let host = CountingHost::default();
        let (value, status) = call(&host, &info("fem_beam_K"), &reals(&[200e9, 0.02, 1e-5, 2.0]));

        assert_eq!(status, 0);
        let k = unwrap_array(value);
        assert_eq!((k.rows, k.cols), (6, 6));
        assert_relative_eq!(k.real_at(0, 0), 200e9 * 0.02 / 2.0, max_relative = 1e-12);
        assert_relative_eq!(k.real_at(2, 5), 2.0 * 200e9 * 1e-5 / 2.0, max_relative = 1e-12);
        assert_eq!(host.live.get(), 1);
    }

    #[test]
    fn test_beam_invalid_length_names_argument_four() {
        let host = CountingHost::default();
        let (value, status) = call(&host, &info("fem_beam_K"), &reals(&[200e9, 0.02, 1e-5, 0.0]));

        assert!(value.is_none());
        assert_eq!(status, (4 << 16) | 3);
        assert_eq!(host.live.get(), 0);
    }

    #[test]
    fn test_plate_rejects_complex_input() {
        let host = CountingHost::default();
        let mut args = reals(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 210e9, 0.3, 0.1]);
        args[4] = HostArg::Scalar(ComplexScalar { real: 0.0, imag: 1.0 });

        let (_, status) = call(&host, &info("plate_K"), &args);
        assert_eq!(status & 0xffff, u32::from(error_index(&FemError::MustBeReal(String::new()))));
        assert_eq!(status >> 16, 5);
    }

    #[test]
    fn test_plate_must_be_positive_names_thickness() {
        let host = CountingHost::default();
        let args = reals(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 210e9, 0.3, 0.0]);
        let (_, status) = call(&host, &info("plate_Kb"), &args);
        assert_eq!(status, (9 << 16) | 6);
    }

    #[test]
    fn test_plate_total_is_bending_plus_shear() {
        let host = CountingHost::default();
        let args = reals(&[0.0, 0.0, 1.5, 0.2, 0.4, 1.1, 210e9, 0.3, 0.1]);

        let kb = unwrap_array(call(&host, &info("plate_Kb"), &args).0);
        let ks = unwrap_array(call(&host, &info("plate_Ks"), &args).0);
        let k = unwrap_array(call(&host, &info("plate_K"), &args).0);

        for row in 0..9 {
            for col in 0..9 {
                assert_relative_eq!(
                    k.real_at(row, col),
                    kb.real_at(row, col) + ks.real_at(row, col),
                    max_relative = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_allocation_failure_reports_insufficient_memory() {
        let host = CountingHost::with_quota(0);
        let args = reals(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 210e9, 0.3, 0.1]);
        let (value, status) = call(&host, &info("plate_K"), &args);

        assert!(value.is_none());
        assert_eq!(status, 7);
        assert_eq!(host.live.get(), 0);
    }

    #[test]
    fn test_fem_solve_spring() {
        let host = CountingHost::default();
        let k = HostMatrix::from_column_slice(2, 2, &[2.0, -2.0, -2.0, 2.0]);
        let f = HostMatrix::from_column_slice(2, 1, &[0.0, 4.0]);
        let supports = HostMatrix::from_column_slice(1, 1, &[1.0]);

        let args = [HostArg::Array(&k), HostArg::Array(&f), HostArg::Array(&supports)];
        let (value, status) = call(&host, &info("fem_solve"), &args);

        assert_eq!(status, 0);
        let u = unwrap_array(value);
        assert_eq!((u.rows, u.cols), (2, 1));
        assert_eq!(u.real_at(0, 0), 0.0);
        assert_relative_eq!(u.real_at(1, 0), 2.0, max_relative = 1e-12);
    }

    #[test]
    fn test_fem_solve_releases_result_on_failure() {
        let k = HostMatrix::from_column_slice(2, 2, &[2.0, -2.0, -2.0, 2.0]);
        let f = HostMatrix::from_column_slice(2, 1, &[0.0, 4.0]);
        let all_fixed = HostMatrix::from_column_slice(2, 1, &[1.0, 1.0]);

        let host = CountingHost::default();
        let args = [HostArg::Array(&k), HostArg::Array(&f), HostArg::Array(&all_fixed)];
        let (value, status) = call(&host, &info("fem_solve"), &args);
        assert!(value.is_none());
        assert_eq!(status, u32::from(error_index(&FemError::NoFreeDofs)));
        assert_eq!(host.allocations.get(), 1);
        assert_eq!(host.live.get(), 0);

        let interrupted = CountingHost {
            interrupted: true,
            ..CountingHost::default()
        };
        let free = HostMatrix::from_column_slice(1, 1, &[1.0]);
        let args = [HostArg::Array(&k), HostArg::Array(&f), HostArg::Array(&free)];
        let (_, status) = call(&interrupted, &info("fem_solve"), &args);
        assert_eq!(status, u32::from(error_index(&FemError::Interrupted)));
        assert_eq!(interrupted.live.get(), 0);
    }

    #[test]
    fn test_mesh_functions_are_one_based() {
        let host = CountingHost::default();

        let connectivity = unwrap_array(call(&host, &info("tri_rect_mesh"), &reals(&[6.0, 4.0, 3.0, 2.0])).0);
        assert_eq!((connectivity.rows, connectivity.cols), (12, 3));
        assert_eq!(
            [connectivity.real_at(0, 0), connectivity.real_at(0, 1), connectivity.real_at(0, 2)],
            [1.0, 2.0, 5.0]
        );

        let elements = unwrap_array(call(&host, &info("tri_elements"), &reals(&[3.0, 2.0])).0);
        assert_eq!(elements, connectivity);

        let nodes = unwrap_array(call(&host, &info("tri_nodes"), &reals(&[6.0, 4.0, 3.0, 2.0])).0);
        assert_eq!((nodes.rows, nodes.cols), (12, 2));
        assert_eq!(nodes.real_at(11, 0), 6.0);
        assert_eq!(nodes.real_at(11, 1), 4.0);
    }

    #[test]
    fn test_mesh_argument_errors() {
        let host = CountingHost::default();

        let (_, status) = call(&host, &info("tri_nodes"), &reals(&[6.0, -4.0, 3.0, 2.0]));
        assert_eq!(status, (2 << 16) | 1);

        let (_, status) = call(&host, &info("tri_rect_mesh"), &reals(&[6.0, 4.0, 3.0, 2.5]));
        assert_eq!(status, (4 << 16) | 2);

        assert_eq!(host.live.get(), 0);
    }

    #[test]
    fn test_oversized_grids_fail_cleanly() {
        let refusing = CountingHost::with_quota(0);

        // the triangle count does not fit in a usize
        let (value, status) = call(&refusing, &info("tri_elements"), &reals(&[1e10, 1e10]));
        assert!(value.is_none());
        assert_eq!(
            status,
            u32::from(error_index(&FemError::InvalidSubdivision(String::new())))
        );

        // countable, but the host will not hand out the array
        let insufficient = u32::from(error_index(&FemError::InsufficientMemory));
        let (_, status) = call(&refusing, &info("tri_elements"), &reals(&[1e5, 1e5]));
        assert_eq!(status, insufficient);
        let (_, status) = call(&refusing, &info("tri_rect_mesh"), &reals(&[1.0, 1.0, 1e5, 1e5]));
        assert_eq!(status, insufficient);
        let (_, status) = call(&refusing, &info("tri_nodes"), &reals(&[1.0, 1.0, 1e5, 1e5]));
        assert_eq!(status, insufficient);

        assert_eq!(refusing.allocations.get(), 0);
        assert_eq!(refusing.live.get(), 0);
    }

    #[test]
    fn test_triangle_scalars() {
        let host = CountingHost::default();
        let args = reals(&[0.0, 0.0, 3.0, 0.0, 0.0, 3.0]);

        assert_eq!(unwrap_scalar(call(&host, &info("tri_area"), &args).0), 4.5);
        let quality = unwrap_scalar(call(&host, &info("tri_quality"), &args).0);
        assert!(quality > 0.0 && quality < 1.0);

        let centroid = unwrap_array(call(&host, &info("tri_centroid"), &args).0);
        assert_eq!((centroid.rows, centroid.cols), (2, 1));
        assert_eq!(centroid.real_at(0, 0), 1.0);
        assert_eq!(centroid.real_at(1, 0), 1.0);
    }

    #[test]
    fn test_analytic_scalars() {
        let host = CountingHost::default();

        let defl = unwrap_scalar(call(&host, &info("cantilever_defl"), &reals(&[10.0, 2.0, 100.0, 1.0])).0);
        assert_relative_eq!(defl, 10.0 * 8.0 / 300.0, max_relative = 1e-12);

        let (_, status) = call(&host, &info("cantilever_rot"), &reals(&[10.0, 2.0, 0.0, 1.0]));
        assert_eq!(status, 4);

        let (_, status) = call(&host, &info("plate_defl"), &reals(&[-1000.0, 0.0, 210e9, 0.3, 0.1]));
        assert_eq!(status, (2 << 16) | 6);

        // NaN never reaches the formulas
        let (value, status) = call(&host, &info("cantilever_defl"), &reals(&[10.0, 2.0, f64::NAN, 1.0]));
        assert!(value.is_none());
        assert_eq!(status, 4);
        let (value, status) = call(&host, &info("plate_defl"), &reals(&[-1000.0, 4.0, 210e9, 0.3, f64::NAN]));
        assert!(value.is_none());
        assert_eq!(status, (5 << 16) | 6);
    }

    #[test]
    fn test_wrong_arity() {
        let host = CountingHost::default();
        let (_, status) = call(&host, &info("tri_area"), &reals(&[0.0, 0.0]));
        assert_eq!(status, 4);
    }
}
