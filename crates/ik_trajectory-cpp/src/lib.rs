//! Manual FFI bindings for the ik_trajectory solver
//!
//! This module provides a C-compatible interface so a C/C++ physics stepper
//! can own an IK solver and call it once per simulation tick.
//!
//! The approach uses:
//! - `#[no_mangle]` functions with C calling convention
//! - Opaque pointer types for safe memory management
//! - Flat `double` arrays for vectors and the row-major Jacobian
//! - Box allocation/deallocation patterns

use ik_trajectory::{IkSolver, SolveMethod, SolverConfig, Vector3};
use std::ffi::{c_double, c_int, c_uint};
use std::ptr;

/// Opaque handle to a Rust IK solver and the chain it owns
pub struct IkTrajectoryHandle {
    solver: IkSolver,
}

fn into_handle(solver: IkSolver) -> *mut IkTrajectoryHandle {
    Box::into_raw(Box::new(IkTrajectoryHandle { solver }))
}

/// Read three doubles into a vector
///
/// # Safety
/// `data` must be non-null and point to at least 3 elements
unsafe fn read_vector3(data: *const c_double) -> Vector3<f64> {
    let values = unsafe { std::slice::from_raw_parts(data, 3) };
    Vector3::new(values[0], values[1], values[2])
}

/// Create a solver for the 7-DOF KUKA LBR iiwa
///
/// # Safety
/// The returned pointer must be freed using `ik_trajectory_free`
#[unsafe(no_mangle)]
pub extern "C" fn ik_trajectory_new_kuka_iiwa() -> *mut IkTrajectoryHandle {
    match IkSolver::kuka_iiwa() {
        Ok(solver) => into_handle(solver),
        Err(_) => ptr::null_mut(),
    }
}

/// Create a solver for a multibody with `num_links` links
///
/// Returns null when no known chain matches the link count.
///
/// # Safety
/// The returned pointer must be freed using `ik_trajectory_free`
#[unsafe(no_mangle)]
pub extern "C" fn ik_trajectory_new_for_joint_count(num_links: c_uint) -> *mut IkTrajectoryHandle {
    match IkSolver::for_joint_count(num_links as usize, SolverConfig::default()) {
        Some(solver) => into_handle(solver),
        None => ptr::null_mut(),
    }
}

/// Free a solver handle
///
/// # Safety
/// The handle must be a valid pointer returned from one of the constructors
/// and must not be used after this call
#[unsafe(no_mangle)]
pub extern "C" fn ik_trajectory_free(handle: *mut IkTrajectoryHandle) {
    if !handle.is_null() {
        unsafe {
            drop(Box::from_raw(handle));
        }
    }
}

/// Compute new joint angles moving the effector toward a target
///
/// `method` uses the codes 0 transpose, 1 pseudoinverse, 2 DLS, 3 SDLS,
/// 4 DLS-SVD; any other code leaves the angles unchanged. Pass
/// `jacobian_size == 0` to use the solver's geometric Jacobian.
///
/// Returns false, without touching `q_new`, on null pointers or when the
/// solver rejects the inputs.
///
/// # Safety
/// - handle must be valid
/// - target and world_position must point to 3 elements
/// - q_current and q_new must point to `num_q` elements
/// - linear_jacobian must point to `jacobian_size` elements when `jacobian_size > 0`
#[allow(clippy::too_many_arguments)]
#[unsafe(no_mangle)]
pub extern "C" fn ik_trajectory_compute(
    handle: *mut IkTrajectoryHandle,
    target: *const c_double,
    world_position: *const c_double,
    q_current: *const c_double,
    num_q: c_uint,
    q_new: *mut c_double,
    method: c_int,
    linear_jacobian: *const c_double,
    jacobian_size: c_uint,
) -> bool {
    if handle.is_null()
        || target.is_null()
        || world_position.is_null()
        || q_current.is_null()
        || q_new.is_null()
    {
        return false;
    }
    if jacobian_size > 0 && linear_jacobian.is_null() {
        return false;
    }

    let handle = unsafe { &mut *handle };
    let target = unsafe { read_vector3(target) };
    let world_position = unsafe { read_vector3(world_position) };
    let q_current = unsafe { std::slice::from_raw_parts(q_current, num_q as usize) };
    let jacobian = (jacobian_size > 0)
        .then(|| unsafe { std::slice::from_raw_parts(linear_jacobian, jacobian_size as usize) });

    let result = handle.solver.solve(
        target,
        world_position,
        q_current,
        SolveMethod::from_code(method),
        jacobian,
    );

    match result {
        Ok(angles) => {
            let out = unsafe { std::slice::from_raw_parts_mut(q_new, num_q as usize) };
            out.copy_from_slice(&angles);
            true
        }
        Err(_) => false,
    }
}

/// Get the number of joints of the solver's chain
#[unsafe(no_mangle)]
pub extern "C" fn ik_trajectory_get_joint_count(handle: *const IkTrajectoryHandle) -> c_uint {
    if handle.is_null() {
        return 0;
    }

    let handle = unsafe { &*handle };
    handle.solver.chain().joint_count() as c_uint
}

/// Get a stored joint angle
///
/// # Safety
/// handle must be valid, out must be a valid pointer
#[unsafe(no_mangle)]
pub extern "C" fn ik_trajectory_get_joint_angle(
    handle: *const IkTrajectoryHandle,
    index: c_uint,
    out: *mut c_double,
) -> bool {
    if handle.is_null() || out.is_null() {
        return false;
    }

    let handle = unsafe { &*handle };
    match handle.solver.chain().joint_angle(index as usize) {
        Some(angle) => {
            unsafe {
                *out = angle;
            }
            true
        }
        None => false,
    }
}

/// Get the effector world position from the chain's last evaluation
///
/// # Safety
/// handle must be valid, out must point to 3 elements
#[unsafe(no_mangle)]
pub extern "C" fn ik_trajectory_get_effector_position(
    handle: *const IkTrajectoryHandle,
    out: *mut c_double,
) -> bool {
    if handle.is_null() || out.is_null() {
        return false;
    }

    let handle = unsafe { &*handle };
    let position = handle.solver.chain().effector_world_position();
    let out = unsafe { std::slice::from_raw_parts_mut(out, 3) };
    out.copy_from_slice(position.as_slice());
    true
}
