//! # Backend Interface
//!
//! The contract between the instrumented program and the backends.
//!
//! A backend is initialized from argv-style tokens and hands back an
//! [`Interface`]: a table of optional hooks, each receiving the backend
//! context. A missing hook is `None` and is skipped by the callers.
//!
//! Several backends can be stacked in a [`Chain`], which forwards every
//! intercepted operation to each backend in order and maintains the shared
//! [`CallStack`].
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use vprec::prelude::*;
//!
//! let call_stack = Arc::new(CallStack::new());
//! let args = ["vprec", "--precision-binary32", "4"];
//! let (interface, context) = Vprec::init(args, Some(call_stack.clone()), None).unwrap();
//!
//! let mut chain = Chain::new(call_stack);
//! chain.push(Loaded::new("vprec", interface, context));
//!
//! // 1 + 1/32 does not fit on 4 bits: tie to even
//! assert_eq!(chain.binary_f32(Operation::Add, 1.0, 0.03125, None), 1.0);
//! // comparisons are not intercepted by VPREC, the native answer is kept
//! assert!(chain.cmp_f64(Predicate::Olt, 1.0, 2.0, None));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::binary::Format;
use crate::callstack::CallStack;
use crate::registry::DataType;
use crate::vprec::dispatch::Operation;

pub type BinaryHook<T, C> = fn(T, T, &mut T, Option<&str>, &C);
pub type CmpHook<T, C> = fn(Predicate, T, T, &mut bool, Option<&str>, &C);
pub type FunctionHook<C> = fn(Option<&str>, &C, &mut [ArgSlot<'_>]);
pub type FinalizeHook<C> = fn(&C);

/// Hook table of a backend, generic over its context `C`.
pub struct Interface<C> {
    pub add_f32: Option<BinaryHook<f32, C>>,
    pub sub_f32: Option<BinaryHook<f32, C>>,
    pub mul_f32: Option<BinaryHook<f32, C>>,
    pub div_f32: Option<BinaryHook<f32, C>>,
    pub cmp_f32: Option<CmpHook<f32, C>>,
    pub add_f64: Option<BinaryHook<f64, C>>,
    pub sub_f64: Option<BinaryHook<f64, C>>,
    pub mul_f64: Option<BinaryHook<f64, C>>,
    pub div_f64: Option<BinaryHook<f64, C>>,
    pub cmp_f64: Option<CmpHook<f64, C>>,
    pub enter_function: Option<FunctionHook<C>>,
    pub exit_function: Option<FunctionHook<C>>,
    pub finalize: Option<FinalizeHook<C>>,
}

impl<C> Interface<C> {
    pub fn binary_f32(&self, op: Operation) -> Option<BinaryHook<f32, C>> {
        match op {
            Operation::Add => self.add_f32,
            Operation::Sub => self.sub_f32,
            Operation::Mul => self.mul_f32,
            Operation::Div => self.div_f32,
        }
    }

    pub fn binary_f64(&self, op: Operation) -> Option<BinaryHook<f64, C>> {
        match op {
            Operation::Add => self.add_f64,
            Operation::Sub => self.sub_f64,
            Operation::Mul => self.mul_f64,
            Operation::Div => self.div_f64,
        }
    }
}

impl<C> Default for Interface<C> {
    fn default() -> Self {
        Self {
            add_f32: None,
            sub_f32: None,
            mul_f32: None,
            div_f32: None,
            cmp_f32: None,
            add_f64: None,
            sub_f64: None,
            mul_f64: None,
            div_f64: None,
            cmp_f64: None,
            enter_function: None,
            exit_function: None,
            finalize: None,
        }
    }
}

impl<C> fmt::Debug for Interface<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("add_f32", &self.add_f32.is_some())
            .field("sub_f32", &self.sub_f32.is_some())
            .field("mul_f32", &self.mul_f32.is_some())
            .field("div_f32", &self.div_f32.is_some())
            .field("cmp_f32", &self.cmp_f32.is_some())
            .field("add_f64", &self.add_f64.is_some())
            .field("sub_f64", &self.sub_f64.is_some())
            .field("mul_f64", &self.mul_f64.is_some())
            .field("div_f64", &self.div_f64.is_some())
            .field("cmp_f64", &self.cmp_f64.is_some())
            .field("enter_function", &self.enter_function.is_some())
            .field("exit_function", &self.exit_function.is_some())
            .field("finalize", &self.finalize.is_some())
            .finish()
    }
}

/// Floating-point comparison predicates, ordered (`O*`) comparisons are false
/// when an operand is NaN, unordered (`U*`) ones are true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Uno,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    True,
}

impl Predicate {
    pub fn evaluate<T: PartialOrd>(self, a: T, b: T) -> bool {
        use std::cmp::Ordering::*;

        let ordering = a.partial_cmp(&b);
        match self {
            Predicate::False => false,
            Predicate::True => true,
            Predicate::Ord => ordering.is_some(),
            Predicate::Uno => ordering.is_none(),
            Predicate::Oeq => ordering == Some(Equal),
            Predicate::Ogt => ordering == Some(Greater),
            Predicate::Oge => matches!(ordering, Some(Greater | Equal)),
            Predicate::Olt => ordering == Some(Less),
            Predicate::Ole => matches!(ordering, Some(Less | Equal)),
            Predicate::One => matches!(ordering, Some(Less | Greater)),
            Predicate::Ueq => matches!(ordering, None | Some(Equal)),
            Predicate::Ugt => matches!(ordering, None | Some(Greater)),
            Predicate::Uge => matches!(ordering, None | Some(Greater | Equal)),
            Predicate::Ult => matches!(ordering, None | Some(Less)),
            Predicate::Ule => matches!(ordering, None | Some(Less | Equal)),
            Predicate::Une => ordering != Some(Equal),
        }
    }
}

/// One floating-point argument of an instrumented call, borrowed mutably so
/// that hooks can round it in place.
///
/// Pointers of unknown size are passed as empty slices.
#[derive(Debug)]
pub enum ArgSlot<'a> {
    Float(&'a mut f32),
    Double(&'a mut f64),
    FloatPtr(&'a mut [f32]),
    DoublePtr(&'a mut [f64]),
}

impl ArgSlot<'_> {
    pub fn data_type(&self) -> DataType {
        match self {
            ArgSlot::Float(_) => DataType::Float,
            ArgSlot::Double(_) => DataType::Double,
            ArgSlot::FloatPtr(_) => DataType::FloatPtr,
            ArgSlot::DoublePtr(_) => DataType::DoublePtr,
        }
    }

    pub fn format(&self) -> Format {
        self.data_type().format()
    }
}

/// An initialized backend: its hook table and its context.
pub struct Loaded<C> {
    name: String,
    pub interface: Interface<C>,
    pub context: C,
}

impl<C> Loaded<C> {
    pub fn new(name: impl Into<String>, interface: Interface<C>, context: C) -> Self {
        Self {
            name: name.into(),
            interface,
            context,
        }
    }
}

/// Object-safe view of a [`Loaded`] backend.
///
/// Every method returns whether the backend implements the hook.
pub trait Instrument: Send + Sync {
    fn name(&self) -> &str;
    fn binary_f32(&self, op: Operation, a: f32, b: f32, res: &mut f32, site: Option<&str>) -> bool;
    fn binary_f64(&self, op: Operation, a: f64, b: f64, res: &mut f64, site: Option<&str>) -> bool;
    fn cmp_f32(&self, p: Predicate, a: f32, b: f32, res: &mut bool, site: Option<&str>) -> bool;
    fn cmp_f64(&self, p: Predicate, a: f64, b: f64, res: &mut bool, site: Option<&str>) -> bool;
    fn enter_function(&self, site: Option<&str>, args: &mut [ArgSlot<'_>]) -> bool;
    fn exit_function(&self, site: Option<&str>, args: &mut [ArgSlot<'_>]) -> bool;
    fn finalize(&self) -> bool;
}

impl<C: Send + Sync> Instrument for Loaded<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn binary_f32(&self, op: Operation, a: f32, b: f32, res: &mut f32, site: Option<&str>) -> bool {
        self.interface
            .binary_f32(op)
            .map(|hook| hook(a, b, res, site, &self.context))
            .is_some()
    }

    fn binary_f64(&self, op: Operation, a: f64, b: f64, res: &mut f64, site: Option<&str>) -> bool {
        self.interface
            .binary_f64(op)
            .map(|hook| hook(a, b, res, site, &self.context))
            .is_some()
    }

    fn cmp_f32(&self, p: Predicate, a: f32, b: f32, res: &mut bool, site: Option<&str>) -> bool {
        self.interface
            .cmp_f32
            .map(|hook| hook(p, a, b, res, site, &self.context))
            .is_some()
    }

    fn cmp_f64(&self, p: Predicate, a: f64, b: f64, res: &mut bool, site: Option<&str>) -> bool {
        self.interface
            .cmp_f64
            .map(|hook| hook(p, a, b, res, site, &self.context))
            .is_some()
    }

    fn enter_function(&self, site: Option<&str>, args: &mut [ArgSlot<'_>]) -> bool {
        self.interface
            .enter_function
            .map(|hook| hook(site, &self.context, args))
            .is_some()
    }

    fn exit_function(&self, site: Option<&str>, args: &mut [ArgSlot<'_>]) -> bool {
        self.interface
            .exit_function
            .map(|hook| hook(site, &self.context, args))
            .is_some()
    }

    fn finalize(&self) -> bool {
        self.interface
            .finalize
            .map(|hook| hook(&self.context))
            .is_some()
    }
}

/// Backends stacked in load order.
///
/// Each intercepted operation starts from the native result and is handed to
/// every backend implementing the hook; the last one writing wins.
pub struct Chain {
    backends: Vec<Box<dyn Instrument>>,
    call_stack: Arc<CallStack>,
}

impl Chain {
    pub fn new(call_stack: Arc<CallStack>) -> Self {
        Self {
            backends: Vec::new(),
            call_stack,
        }
    }

    pub fn push(&mut self, backend: impl Instrument + 'static) {
        self.backends.push(Box::new(backend));
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.iter().map(|backend| backend.name())
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    pub fn binary_f32(&self, op: Operation, a: f32, b: f32, site: Option<&str>) -> f32 {
        let mut res = op.apply(a, b);
        for backend in &self.backends {
            backend.binary_f32(op, a, b, &mut res, site);
        }
        res
    }

    pub fn binary_f64(&self, op: Operation, a: f64, b: f64, site: Option<&str>) -> f64 {
        let mut res = op.apply(a, b);
        for backend in &self.backends {
            backend.binary_f64(op, a, b, &mut res, site);
        }
        res
    }

    pub fn cmp_f32(&self, p: Predicate, a: f32, b: f32, site: Option<&str>) -> bool {
        let mut res = p.evaluate(a, b);
        for backend in &self.backends {
            backend.cmp_f32(p, a, b, &mut res, site);
        }
        res
    }

    pub fn cmp_f64(&self, p: Predicate, a: f64, b: f64, site: Option<&str>) -> bool {
        let mut res = p.evaluate(a, b);
        for backend in &self.backends {
            backend.cmp_f64(p, a, b, &mut res, site);
        }
        res
    }

    /// Records the call on the call stack, then hands the arguments to the
    /// backends.
    pub fn enter_function(&self, site: Option<&str>, args: &mut [ArgSlot<'_>]) {
        self.call_stack.push(site.unwrap_or("(null)"));
        for backend in &self.backends {
            backend.enter_function(site, args);
        }
    }

    pub fn exit_function(&self, site: Option<&str>, args: &mut [ArgSlot<'_>]) {
        for backend in &self.backends {
            backend.exit_function(site, args);
        }
        self.call_stack.pop();
    }

    pub fn finalize(&self) {
        for backend in &self.backends {
            backend.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::rstest;

    use super::*;

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
        depth_on_enter: AtomicUsize,
    }

    fn double_f64(a: f64, b: f64, res: &mut f64, _: Option<&str>, counter: &Counter) {
        counter.calls.fetch_add(1, Ordering::Relaxed);
        *res = 2.0 * (a + b);
    }

    fn negate_cmp(_: Predicate, _: f64, _: f64, res: &mut bool, _: Option<&str>, counter: &Counter) {
        counter.calls.fetch_add(1, Ordering::Relaxed);
        *res = !*res;
    }

    fn zero_args(_: Option<&str>, counter: &Counter, args: &mut [ArgSlot<'_>]) {
        counter.calls.fetch_add(1, Ordering::Relaxed);
        for arg in args {
            match arg {
                ArgSlot::Double(value) => **value = 0.0,
                ArgSlot::FloatPtr(values) => values.fill(0.0),
                _ => {}
            }
        }
    }

    fn counting_backend() -> Loaded<Counter> {
        let interface = Interface {
            add_f64: Some(double_f64 as BinaryHook<f64, Counter>),
            cmp_f64: Some(negate_cmp as CmpHook<f64, Counter>),
            enter_function: Some(zero_args as FunctionHook<Counter>),
            ..Interface::default()
        };
        Loaded::new("counter", interface, Counter::default())
    }

    #[test]
    fn test_missing_hooks_are_skipped() {
        let backend = counting_backend();
        let mut res = 1.0f32;
        assert!(!backend.binary_f32(Operation::Add, 1.0, 2.0, &mut res, None));
        assert_eq!(res, 1.0);
        assert!(!backend.finalize());

        let mut res = 0.0;
        assert!(backend.binary_f64(Operation::Add, 1.0, 2.0, &mut res, None));
        assert!(!backend.binary_f64(Operation::Sub, 1.0, 2.0, &mut res, None));
        assert_eq!(res, 6.0);
        assert_eq!(backend.context.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_chain_defaults_to_native_results() {
        let mut chain = Chain::new(Arc::new(CallStack::new()));
        assert!(chain.is_empty());
        assert_eq!(chain.binary_f64(Operation::Div, 1.0, 4.0, None), 0.25);

        chain.push(counting_backend());
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.names().collect::<Vec<_>>(), ["counter"]);
        assert_eq!(chain.binary_f64(Operation::Add, 1.0, 2.0, None), 6.0);
        assert_eq!(chain.binary_f64(Operation::Mul, 3.0, 2.0, None), 6.0);
        assert_eq!(chain.binary_f32(Operation::Sub, 3.0, 2.0, None), 1.0);
        assert!(!chain.cmp_f64(Predicate::Olt, 1.0, 2.0, None));
        assert!(chain.cmp_f32(Predicate::Olt, 1.0, 2.0, None));
    }

    #[test]
    fn test_chain_tracks_calls() {
        struct Depth(Arc<CallStack>);

        fn record_depth(_: Option<&str>, depth: &Depth, _: &mut [ArgSlot<'_>]) {
            assert_eq!(depth.0.top().as_deref(), Some("main.c/main/0"));
        }

        let call_stack = Arc::new(CallStack::new());
        let mut chain = Chain::new(call_stack.clone());
        chain.push(counting_backend());
        let interface = Interface {
            enter_function: Some(record_depth as FunctionHook<Depth>),
            exit_function: Some(record_depth as FunctionHook<Depth>),
            ..Interface::default()
        };
        chain.push(Loaded::new("depth", interface, Depth(call_stack.clone())));

        let mut x = 3.0;
        let mut v = [1.0f32, 2.0];
        let mut y = 5.0f32;
        let mut args = [
            ArgSlot::Double(&mut x),
            ArgSlot::FloatPtr(&mut v),
            ArgSlot::Float(&mut y),
        ];
        chain.enter_function(Some("main.c/main/0"), &mut args);
        assert_eq!(chain.call_stack().depth(), 1);
        chain.exit_function(Some("main.c/main/0"), &mut args);
        assert_eq!(call_stack.depth(), 0);

        assert_eq!(x, 0.0);
        assert_eq!(v, [0.0, 0.0]);
        assert_eq!(y, 5.0);
    }

    #[rstest]
    #[case(Predicate::Oeq, [false, true, false, false])]
    #[case(Predicate::Ogt, [false, false, true, false])]
    #[case(Predicate::Oge, [false, true, true, false])]
    #[case(Predicate::Olt, [true, false, false, false])]
    #[case(Predicate::Ole, [true, true, false, false])]
    #[case(Predicate::One, [true, false, true, false])]
    #[case(Predicate::Ord, [true, true, true, false])]
    #[case(Predicate::Uno, [false, false, false, true])]
    #[case(Predicate::Ueq, [false, true, false, true])]
    #[case(Predicate::Ugt, [false, false, true, true])]
    #[case(Predicate::Uge, [false, true, true, true])]
    #[case(Predicate::Ult, [true, false, false, true])]
    #[case(Predicate::Ule, [true, true, false, true])]
    #[case(Predicate::Une, [true, false, true, true])]
    #[case(Predicate::False, [false; 4])]
    #[case(Predicate::True, [true; 4])]
    fn test_predicates(#[case] predicate: Predicate, #[case] expected: [bool; 4]) {
        // less, equal, greater, unordered
        let pairs = [(1.0, 2.0), (2.0, 2.0), (3.0, 2.0), (f64::NAN, 2.0)];
        for ((a, b), expected) in pairs.into_iter().zip(expected) {
            assert_eq!(predicate.evaluate(a, b), expected, "{predicate:?}({a}, {b})");
        }
    }

    #[test]
    fn test_arg_slot_metadata() {
        let mut x = 1.0f32;
        let mut v = [0.0f64; 5];
        let scalar = ArgSlot::Float(&mut x);
        assert_eq!(scalar.data_type(), DataType::Float);
        assert_eq!(scalar.format(), Format::Binary32);
        let array = ArgSlot::DoublePtr(&mut v);
        assert_eq!(array.data_type(), DataType::DoublePtr);
        assert_eq!(array.format(), Format::Binary64);
    }
}
