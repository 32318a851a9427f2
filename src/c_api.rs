//! C ABI for hosts that drive the sandbox from another language.
//!
//! Body ids cross the boundary as `u64` ([`BodyId::to_bits`]); 0 never names
//! a live body and doubles as the failure value. Events are queued inside the
//! handle and drained with [`Sandbox_PollEvent`]. The queue holds
//! [`EventQueue::DEFAULT_CAPACITY`] events; hosts that fall behind lose the
//! oldest ones, counted by [`Sandbox_GetDroppedEventCount`].

use crate::{
    body::{Body, BodyId},
    config::SimConfig,
    events::{BreakReason, Event, EventQueue},
    orbit::OrbitSpec,
    quadtree::Node,
    simulation::Simulation,
};
use std::{ffi::CStr, os::raw::c_char};
use ultraviolet::Vec2;

/// Opaque handle owned by the host.
#[derive(Debug, Default)]
pub struct Sandbox {
    pub sim: Simulation,
    pub events: EventQueue,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    BodyCreated = 0,
    BodyDeleted = 1,
    BodiesMerged = 2,
    SpringLinked = 3,
    SpringStretched = 4,
    SpringOverloaded = 5,
    Cleared = 6,
    Paused = 7,
    Resumed = 8,
    SpringUnlinked = 9,
}

/// Flattened [`Event`]. Unused fields are zero.
///
/// `a`/`b` are the bodies involved (the absorbed pair for merges), `c` is the
/// merged body and `x`/`y` the spring midpoint.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CEvent {
    pub kind: EventKind,
    pub a: u64,
    pub b: u64,
    pub c: u64,
    pub x: f32,
    pub y: f32,
}

impl From<&Event> for CEvent {
    fn from(event: &Event) -> Self {
        let blank = |kind| CEvent {
            kind,
            a: 0,
            b: 0,
            c: 0,
            x: 0.0,
            y: 0.0,
        };
        match *event {
            Event::BodyCreated { id } => CEvent {
                a: id.to_bits(),
                ..blank(EventKind::BodyCreated)
            },
            Event::BodyDeleted { id } => CEvent {
                a: id.to_bits(),
                ..blank(EventKind::BodyDeleted)
            },
            Event::BodiesMerged { absorbed, merged } => CEvent {
                a: absorbed[0].to_bits(),
                b: absorbed[1].to_bits(),
                c: merged.to_bits(),
                ..blank(EventKind::BodiesMerged)
            },
            Event::SpringLinked { a, b } => CEvent {
                a: a.to_bits(),
                b: b.to_bits(),
                ..blank(EventKind::SpringLinked)
            },
            Event::SpringUnlinked { a, b } => CEvent {
                a: a.to_bits(),
                b: b.to_bits(),
                ..blank(EventKind::SpringUnlinked)
            },
            Event::SpringBroken { a, b, midpoint, reason } => CEvent {
                a: a.to_bits(),
                b: b.to_bits(),
                x: midpoint.x,
                y: midpoint.y,
                ..blank(match reason {
                    BreakReason::Stretched => EventKind::SpringStretched,
                    BreakReason::Overloaded => EventKind::SpringOverloaded,
                })
            },
            Event::Cleared => blank(EventKind::Cleared),
            Event::Paused => blank(EventKind::Paused),
            Event::Resumed => blank(EventKind::Resumed),
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Create() -> *mut Sandbox {
    Box::into_raw(Box::default())
}

/// Returns null if the text is not valid UTF-8 or not a valid configuration.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_CreateFromYaml(yaml: *const c_char) -> *mut Sandbox {
    if yaml.is_null() {
        return std::ptr::null_mut();
    }
    let text = unsafe { CStr::from_ptr(yaml) };
    let config = match text.to_str().map_err(|e| e.to_string()).and_then(|t| {
        SimConfig::from_yaml_str(t).map_err(|e| e.to_string())
    }) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("Rejected sandbox configuration: {err}");
            return std::ptr::null_mut();
        }
    };
    match Simulation::new(config) {
        Ok(sim) => Box::into_raw(Box::new(Sandbox {
            sim,
            events: EventQueue::default(),
        })),
        Err(err) => {
            log::warn!("Rejected sandbox configuration: {err}");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Destroy(handle: *mut Sandbox) {
    if !handle.is_null() {
        unsafe { drop(Box::from_raw(handle)) };
    }
}

/// Returns the number of fixed ticks run.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Update(handle: *mut Sandbox, now_ms: u64) -> usize {
    let sandbox = unsafe { handle.as_mut() };
    sandbox.map_or(0, |s| s.sim.update(now_ms, &mut s.events))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Tick(handle: *mut Sandbox) {
    if let Some(s) = unsafe { handle.as_mut() } {
        s.sim.tick(&mut s.events);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Pause(handle: *mut Sandbox) {
    if let Some(s) = unsafe { handle.as_mut() } {
        s.sim.pause(&mut s.events);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Resume(handle: *mut Sandbox, now_ms: u64) {
    if let Some(s) = unsafe { handle.as_mut() } {
        s.sim.resume(now_ms, &mut s.events);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_IsPaused(handle: *const Sandbox) -> bool {
    let sandbox = unsafe { handle.as_ref() };
    sandbox.is_some_and(|s| s.sim.is_paused())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Clear(handle: *mut Sandbox) {
    if let Some(s) = unsafe { handle.as_mut() } {
        s.sim.clear(&mut s.events);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_SetTheta(handle: *mut Sandbox, theta: f32) {
    if let Some(s) = unsafe { handle.as_mut() } {
        s.sim.set_theta(theta);
    }
}

/// Returns the new body's id, or 0 if it was rejected.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_AddBody(
    handle: *mut Sandbox,
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    mass: f32,
    r: u8,
    g: u8,
    b: u8,
) -> u64 {
    let Some(s) = (unsafe { handle.as_mut() }) else {
        return 0;
    };
    s.sim
        .add_body(Vec2::new(x, y), Vec2::new(vx, vy), mass, [r, g, b], &mut s.events)
        .map_or(0, BodyId::to_bits)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_DeleteBody(handle: *mut Sandbox, id: u64) -> bool {
    let Some(s) = (unsafe { handle.as_mut() }) else {
        return false;
    };
    s.sim.delete_body(BodyId::from_bits(id), &mut s.events).is_ok()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_SetVelocity(handle: *mut Sandbox, id: u64, vx: f32, vy: f32) -> bool {
    let sandbox = unsafe { handle.as_mut() };
    sandbox
        .is_some_and(|s| s.sim.set_velocity(BodyId::from_bits(id), Vec2::new(vx, vy)).is_ok())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_SetPosition(handle: *mut Sandbox, id: u64, x: f32, y: f32) -> bool {
    let sandbox = unsafe { handle.as_mut() };
    sandbox
        .is_some_and(|s| s.sim.set_position(BodyId::from_bits(id), Vec2::new(x, y)).is_ok())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Select(handle: *mut Sandbox, id: u64, selected: bool) -> bool {
    let sandbox = unsafe { handle.as_mut() };
    sandbox.is_some_and(|s| {
        let id = BodyId::from_bits(id);
        if selected {
            s.sim.select(id).is_ok()
        } else {
            s.sim.unselect(id).is_ok()
        }
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Link(handle: *mut Sandbox, a: u64, b: u64) -> bool {
    let Some(s) = (unsafe { handle.as_mut() }) else {
        return false;
    };
    s.sim
        .link(BodyId::from_bits(a), BodyId::from_bits(b), &mut s.events)
        .is_ok()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Unlink(handle: *mut Sandbox, a: u64, b: u64) -> bool {
    let Some(s) = (unsafe { handle.as_mut() }) else {
        return false;
    };
    s.sim
        .unlink(BodyId::from_bits(a), BodyId::from_bits(b), &mut s.events)
}

/// Returns how many satellites were placed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_SpawnOrbitals(
    handle: *mut Sandbox,
    reference: u64,
    count: usize,
    distance_mean: f32,
    distance_std: f32,
    mass_ratio_mean: f32,
    mass_ratio_std: f32,
    eccentricity: f32,
) -> usize {
    let Some(s) = (unsafe { handle.as_mut() }) else {
        return 0;
    };
    let spec = OrbitSpec {
        count,
        distance_mean,
        distance_std,
        mass_ratio_mean,
        mass_ratio_std,
        eccentricity,
    };
    s.sim
        .spawn_orbital_bodies(BodyId::from_bits(reference), &spec, &mut s.events)
        .map_or(0, |ids| ids.len())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_AddCompositeEnergy(
    handle: *mut Sandbox,
    id: u64,
    internal: f32,
    rotational: f32,
) -> bool {
    let sandbox = unsafe { handle.as_mut() };
    sandbox.is_some_and(|s| {
        s.sim
            .add_composite_energy(BodyId::from_bits(id), internal, rotational)
            .is_ok()
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_GetBodyCount(handle: *const Sandbox) -> usize {
    let sandbox = unsafe { handle.as_ref() };
    sandbox.map_or(0, |s| s.sim.bodies().len())
}

/// Dense body array, valid until the next mutating call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_GetBodies(handle: *const Sandbox) -> *const Body {
    let sandbox = unsafe { handle.as_ref() };
    sandbox.map_or(std::ptr::null(), |s| s.sim.bodies().as_slice().as_ptr())
}

/// Id of the body at `index` in [`Sandbox_GetBodies`], or 0.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_GetBodyId(handle: *const Sandbox, index: usize) -> u64 {
    let sandbox = unsafe { handle.as_ref() };
    sandbox
        .and_then(|s| s.sim.bodies().id_at(index))
        .map_or(0, BodyId::to_bits)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_GetNodeCount(handle: *const Sandbox) -> usize {
    let sandbox = unsafe { handle.as_ref() };
    sandbox.map_or(0, |s| s.sim.quadtree().nodes.len())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_GetNodes(handle: *const Sandbox) -> *const Node {
    let sandbox = unsafe { handle.as_ref() };
    sandbox.map_or(std::ptr::null(), |s| s.sim.quadtree().nodes.as_ptr())
}

/// Writes up to `capacity` segments as `x1, y1, x2, y2` quadruples into
/// `out` and returns how many were written. With a null `out`, returns the
/// total number of segments instead.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_GetSpringSegments(
    handle: *const Sandbox,
    out: *mut f32,
    capacity: usize,
) -> usize {
    let Some(s) = (unsafe { handle.as_ref() }) else {
        return 0;
    };
    if out.is_null() {
        return s.sim.spring_segments().count();
    }

    let out = unsafe { std::slice::from_raw_parts_mut(out, capacity * 4) };
    let mut written = 0;
    for ((a, b), chunk) in s.sim.spring_segments().zip(out.chunks_exact_mut(4)) {
        chunk.copy_from_slice(&[a.x, a.y, b.x, b.y]);
        written += 1;
    }
    written
}

/// Pops the oldest queued event into `out`. Returns false when the queue is
/// empty.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_PollEvent(handle: *mut Sandbox, out: *mut CEvent) -> bool {
    let (Some(s), Some(out)) = (unsafe { handle.as_mut() }, unsafe { out.as_mut() }) else {
        return false;
    };
    match s.events.pop() {
        Some(event) => {
            *out = CEvent::from(&event);
            true
        }
        None => false,
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_GetDroppedEventCount(handle: *const Sandbox) -> u64 {
    let sandbox = unsafe { handle.as_ref() };
    sandbox.map_or(0, |s| s.events.dropped())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_event() -> CEvent {
        CEvent {
            kind: EventKind::Cleared,
            a: 0,
            b: 0,
            c: 0,
            x: 0.0,
            y: 0.0,
        }
    }

    #[test]
    fn round_trip_through_the_handle() {
        unsafe {
            let handle = Sandbox_Create();
            let a = Sandbox_AddBody(handle, 0.0, 0.0, 0.0, 0.0, 1.0, 255, 0, 0);
            let b = Sandbox_AddBody(handle, 10.0, 0.0, 0.0, 0.0, 1.0, 0, 255, 0);
            assert!(a != 0 && b != 0);
            assert_eq!(Sandbox_AddBody(handle, 0.0, 0.0, 0.0, 0.0, -1.0, 0, 0, 0), 0);
            assert!(Sandbox_Link(handle, a, b));
            assert!(!Sandbox_Link(handle, b, a));

            Sandbox_Tick(handle);
            assert_eq!(Sandbox_GetBodyCount(handle), 2);
            assert!(Sandbox_GetNodeCount(handle) > 0);
            assert!(!Sandbox_GetBodies(handle).is_null());
            let first = Sandbox_GetBodyId(handle, 0);
            assert!(first == a || first == b);

            assert_eq!(Sandbox_GetSpringSegments(handle, std::ptr::null_mut(), 0), 1);
            let mut segment = [0.0f32; 4];
            assert_eq!(Sandbox_GetSpringSegments(handle, segment.as_mut_ptr(), 1), 1);
            assert!(segment[2] > segment[0]);

            let mut event = blank_event();
            let mut kinds = Vec::new();
            while Sandbox_PollEvent(handle, &mut event) {
                kinds.push(event.kind);
            }
            assert_eq!(
                kinds,
                vec![EventKind::BodyCreated, EventKind::BodyCreated, EventKind::SpringLinked]
            );

            assert!(Sandbox_Unlink(handle, b, a));
            assert!(!Sandbox_Unlink(handle, a, b));
            assert!(Sandbox_PollEvent(handle, &mut event));
            assert_eq!(event.kind, EventKind::SpringUnlinked);
            assert_eq!((event.a, event.b), (b, a));
            assert_eq!(Sandbox_GetSpringSegments(handle, std::ptr::null_mut(), 0), 0);

            assert!(!Sandbox_SetPosition(handle, a, f32::NAN, 0.0));
            assert!(!Sandbox_SetVelocity(handle, a, f32::INFINITY, 0.0));
            assert_eq!(Sandbox_GetDroppedEventCount(handle), 0);

            assert!(Sandbox_DeleteBody(handle, b));
            assert!(!Sandbox_DeleteBody(handle, b));
            assert!(!Sandbox_SetVelocity(handle, b, 1.0, 0.0));
            assert!(Sandbox_SetVelocity(handle, a, 1.0, 0.0));

            Sandbox_Pause(handle);
            assert!(Sandbox_IsPaused(handle));
            Sandbox_Resume(handle, 0);
            assert!(!Sandbox_IsPaused(handle));

            Sandbox_Destroy(handle);
        }
    }

    #[test]
    fn null_handles_are_ignored() {
        unsafe {
            assert_eq!(Sandbox_GetBodyCount(std::ptr::null()), 0);
            assert_eq!(Sandbox_Update(std::ptr::null_mut(), 10), 0);
            assert!(!Sandbox_PollEvent(std::ptr::null_mut(), &mut blank_event()));
            Sandbox_Destroy(std::ptr::null_mut());
            assert!(Sandbox_CreateFromYaml(std::ptr::null()).is_null());
        }
    }

    #[test]
    fn yaml_configuration() {
        unsafe {
            let handle = Sandbox_CreateFromYaml(c"max_bodies: 1".as_ptr());
            assert!(!handle.is_null());
            assert!(Sandbox_AddBody(handle, 0.0, 0.0, 0.0, 0.0, 1.0, 0, 0, 0) != 0);
            assert_eq!(Sandbox_AddBody(handle, 5.0, 0.0, 0.0, 0.0, 1.0, 0, 0, 0), 0);
            Sandbox_Destroy(handle);

            assert!(Sandbox_CreateFromYaml(c"dt: -1.0".as_ptr()).is_null());
        }
    }

    #[test]
    fn spring_break_flattens_with_midpoint() {
        let a = BodyId::from_bits(1 << 32);
        let b = BodyId::from_bits((1 << 32) | 1);
        let event = CEvent::from(&Event::SpringBroken {
            a,
            b,
            midpoint: Vec2::new(1.0, 2.0),
            reason: BreakReason::Overloaded,
        });
        assert_eq!(event.kind, EventKind::SpringOverloaded);
        assert_eq!((event.a, event.b, event.c), (a.to_bits(), b.to_bits(), 0));
        assert_eq!((event.x, event.y), (1.0, 2.0));
    }
}
