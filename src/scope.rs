//! The render-time scope chain.
//!
//! `spec.md` §4.3 / §9: a loop pushes its item variable (and optional index
//! variable) into a new scope layer; a variable path's first segment is
//! looked up in scope before falling back to the root data. The recommended
//! representation (§9) is a linked stack of frames, each owning only the
//! variables it introduces; a `Vec`-backed stack with push/pop is explicitly
//! called out as acceptable, so that is what we use here.

use smallvec::SmallVec;

use crate::value::Value;

/// A loop frame binds `itemVar` and, optionally, `indexVar` — almost never
/// more than two names — so each frame is a small inline vector rather than
/// a heap-allocated one.
type Frame = SmallVec<[(String, Value); 2]>;

#[derive(Debug, Default)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Pushes a new frame and returns a guard that pops it on drop, so a
    /// caller can't forget to unwind a loop iteration's bindings.
    pub fn push_frame(&mut self) -> FrameGuard<'_> {
        self.frames.push(Frame::new());
        FrameGuard { scope: self }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.frames
            .last_mut()
            .expect("bind called with no active frame")
            .push((name.into(), value));
    }

    /// Looks up `name` in the nearest-enclosing frame first, per the scope
    /// chain's "scope first, data second" resolution rule.
    pub fn get(&self, name: &str) -> Option<&Value> {
        for frame in self.frames.iter().rev() {
            if let Some((_, v)) = frame.iter().rev().find(|(k, _)| k == name) {
                return Some(v);
            }
        }
        None
    }
}

pub struct FrameGuard<'a> {
    scope: &'a mut Scope,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.scope.frames.pop();
    }
}

impl std::ops::Deref for FrameGuard<'_> {
    type Target = Scope;
    fn deref(&self) -> &Scope {
        self.scope
    }
}

impl std::ops::DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scope {
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_frame_shadows_outer() {
        let mut scope = Scope::new();
        {
            let mut f1 = scope.push_frame();
            f1.bind("x", Value::Number(1.0));
            {
                let mut f2 = f1.push_frame();
                f2.bind("x", Value::Number(2.0));
                assert_eq!(f2.get("x"), Some(&Value::Number(2.0)));
            }
            assert_eq!(f1.get("x"), Some(&Value::Number(1.0)));
        }
        assert_eq!(scope.get("x"), None);
    }
}
