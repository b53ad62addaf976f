//! A stack of variables being checked (spec §4.C "Scope"): the
//! checker's model of what's in scope at a given point, as distinct
//! from the bytecode compiler's frame-slot allocation (`fble-compiler`
//! owns the latter).
//!
//! Modeled as one `Vec<Frame>` stack rather than a chain of borrowed
//! parent scopes: each `FuncValue`/`Eval`/`Link`/`Exec` body pushes a
//! new [`Frame`], and a name lookup walks the stack top-down, charging
//! a capture to every frame it crosses on the way to where the name was
//! actually bound.

use crate::tc::VarIndex;
use fble_common::{Diagnostic, DiagnosticSink, Loc, Phase};
use fble_types::TypeId;
use rustc_hash::FxHashMap;

struct Var {
    name: String,
    ty: TypeId,
    used: bool,
    accessed: bool,
    index: VarIndex,
    loc: Loc,
}

struct CapturedVar {
    /// This variable's index in the *parent* frame — what the bytecode
    /// compiler actually needs to emit a `FuncValue` capture list.
    parent_index: VarIndex,
    ty: TypeId,
}

/// One function/process body's local variables and captures.
struct Frame {
    vars: Vec<Var>,
    captured: Vec<CapturedVar>,
    captured_by_name: FxHashMap<String, usize>,
    /// A phantom frame (pushed while checking a type expression that
    /// will be erased before anything runs) records no captures and
    /// charges nothing to its ancestors.
    phantom: bool,
}

impl Frame {
    fn new(phantom: bool) -> Self {
        Frame {
            vars: Vec::new(),
            captured: Vec::new(),
            captured_by_name: FxHashMap::default(),
            phantom,
        }
    }
}

pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            frames: vec![Frame::new(false)],
        }
    }

    pub fn push_frame(&mut self, phantom: bool) {
        self.frames.push(Frame::new(phantom));
    }

    /// Pops the top frame, emitting unused-variable warnings (spec
    /// §4.C: "unused-but-not-accessed variables whose names do not
    /// start with `_` emit warnings"), and returns the enclosing-frame
    /// indices it captured, in capture-slot order.
    pub fn pop_frame(&mut self, diags: &mut DiagnosticSink) -> Vec<VarIndex> {
        let frame = self.frames.pop().expect("pop_frame on an empty scope");
        for v in &frame.vars {
            if !v.used && !v.accessed && !v.name.starts_with('_') {
                diags.push(Diagnostic::warning(
                    Phase::Check,
                    v.loc.clone(),
                    format!("unused variable: {}", v.name),
                ));
            }
        }
        frame.captured.into_iter().map(|c| c.parent_index).collect()
    }

    pub fn local_count(&self) -> usize {
        self.frames.last().expect("empty scope").vars.len()
    }

    /// Binds a new local variable (function argument or `let`/`exec`
    /// binding) at the next local index in the current frame.
    pub fn push_local(&mut self, name: impl Into<String>, ty: TypeId, loc: Loc) -> VarIndex {
        let frame = self.frames.last_mut().expect("empty scope");
        let index = VarIndex::local(frame.vars.len());
        frame.vars.push(Var {
            name: name.into(),
            ty,
            used: false,
            accessed: false,
            index,
            loc,
        });
        index
    }

    /// Looks a name up starting from the innermost frame. A hit in an
    /// outer frame is recorded as a capture in every frame between here
    /// and there (skipping phantom frames, which pass the lookup
    /// through without charging a capture), and the returned index is
    /// always relative to the *current* frame.
    pub fn lookup(&mut self, name: &str) -> Option<(VarIndex, TypeId)> {
        let top = self.frames.len() - 1;
        self.lookup_from(top, name)
    }

    fn lookup_from(&mut self, frame_idx: usize, name: &str) -> Option<(VarIndex, TypeId)> {
        if let Some(pos) = self.frames[frame_idx]
            .vars
            .iter()
            .rposition(|v| v.name == name)
        {
            let v = &mut self.frames[frame_idx].vars[pos];
            v.used = true;
            v.accessed = true;
            return Some((v.index, v.ty));
        }
        if let Some(&slot) = self.frames[frame_idx].captured_by_name.get(name) {
            let c = &self.frames[frame_idx].captured[slot];
            return Some((VarIndex::static_(slot), c.ty));
        }
        if frame_idx == 0 {
            return None;
        }
        let (parent_index, ty) = self.lookup_from(frame_idx - 1, name)?;
        if self.frames[frame_idx].phantom {
            return Some((VarIndex::static_(usize::MAX), ty));
        }
        let frame = &mut self.frames[frame_idx];
        let slot = frame.captured.len();
        frame.captured.push(CapturedVar { parent_index, ty });
        frame.captured_by_name.insert(name.to_string(), slot);
        Some((VarIndex::static_(slot), ty))
    }

    /// Marks a name as referenced without counting as a use — so a
    /// recursive `let` binding referring to itself doesn't trip the
    /// unused-variable warning for a binding that's genuinely unused
    /// everywhere else.
    pub fn mark_accessed(&mut self, name: &str) {
        if let Some(frame) = self.frames.last_mut() {
            if let Some(v) = frame.vars.iter_mut().rfind(|v| v.name == name) {
                v.accessed = true;
            }
        }
    }

    /// Spec §4.C "Let": the emitted `Tc.Let.recursive` flag is true iff
    /// any binding's own variable was read while checking the bindings
    /// — this is exactly the `accessed` flag `mark_accessed`/`lookup`
    /// already maintain.
    pub fn was_accessed(&self, name: &str) -> bool {
        self.frames
            .last()
            .and_then(|f| f.vars.iter().rfind(|v| v.name == name))
            .is_some_and(|v| v.accessed)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}
