//! Lifetime accounting for instrumented types
//!
//! Every instrumented type owns a set of six counters (construct,
//! copy-construct, move-construct, destruct, copy-assign, move-assign) stored
//! in a process-wide [`CounterRegistry`]. Types opt in by embedding an
//! [`InstanceCounter<Self>`] field, or are wrapped from the outside with
//! [`Counted<T>`]. At shutdown, [`CounterRegistry::validate`] reports every
//! type whose constructions and destructions do not balance.
//!
//! Rust moves are bitwise copies and cannot be observed. The move counters
//! record the explicit transfer operations [`InstanceCounter::take_from`] and
//! [`InstanceCounter::assign_from`], which leave the source alive (and later
//! destroyed) exactly like a moved-from object in other languages.
//!
//! Counter slots are atomics and the registry index is behind a mutex, so the
//! registry can be shared between threads.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Lifetime event recorded by a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifetimeEvent {
    /// A fresh instance was created
    Construct,
    /// An instance was created by copying another
    CopyConstruct,
    /// An instance was created by taking over another's contents
    MoveConstruct,
    /// An instance was destroyed
    Destruct,
    /// An existing instance was overwritten with a copy
    CopyAssign,
    /// An existing instance took over another's contents
    MoveAssign,
}

impl LifetimeEvent {
    /// Number of distinct events
    pub const COUNT: usize = 6;

    /// All events in table order
    pub const ALL: [Self; Self::COUNT] = [
        Self::Construct,
        Self::CopyConstruct,
        Self::MoveConstruct,
        Self::Destruct,
        Self::CopyAssign,
        Self::MoveAssign,
    ];

    /// Slot index of the event
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human readable label used in reports
    pub const fn label(self) -> &'static str {
        match self {
            Self::Construct => "Constructions",
            Self::CopyConstruct => "Copy-constructions",
            Self::MoveConstruct => "Move-constructions",
            Self::Destruct => "Destructions",
            Self::CopyAssign => "Copy-assignments",
            Self::MoveAssign => "Move-assignments",
        }
    }
}

/// Point-in-time copy of one type's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    counts: [i64; LifetimeEvent::COUNT],
}

impl CounterSnapshot {
    /// Count recorded for one event
    pub const fn get(&self, event: LifetimeEvent) -> i64 {
        self.counts[event.index()]
    }

    /// Constructions of any kind minus destructions
    ///
    /// Positive means instances are still alive (or leaked), negative means
    /// something was destroyed more often than it was created.
    pub const fn balance(&self) -> i64 {
        self.get(LifetimeEvent::Construct)
            + self.get(LifetimeEvent::CopyConstruct)
            + self.get(LifetimeEvent::MoveConstruct)
            - self.get(LifetimeEvent::Destruct)
    }

    /// Number of instances currently alive according to the counters
    pub const fn alive(&self) -> i64 {
        self.balance()
    }

    fn accumulate(&mut self, other: &Self) {
        for (total, count) in self.counts.iter_mut().zip(other.counts) {
            *total += count;
        }
    }
}

/// The six counters of one registered type
#[derive(Debug)]
pub struct CounterSet {
    name: String,
    counts: [AtomicI64; LifetimeEvent::COUNT],
}

impl CounterSet {
    fn new(name: String) -> Self {
        Self {
            name,
            counts: Default::default(),
        }
    }

    /// Display name of the registered type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record one event
    pub fn record(&self, event: LifetimeEvent) {
        self.counts[event.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Current value of one counter
    pub fn get(&self, event: LifetimeEvent) -> i64 {
        self.counts[event.index()].load(Ordering::Relaxed)
    }

    /// Copy all six counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            counts: LifetimeEvent::ALL.map(|event| self.get(event)),
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    index: HashMap<TypeId, usize>,
    entries: Vec<Arc<CounterSet>>,
}

/// Registry of counter sets, one per instrumented type, in registration order
///
/// # Examples
/// ```
/// # use laser_engine::foundation::counters::{CounterRegistry, InstanceCounter};
/// struct Widget;
///
/// let registry = CounterRegistry::new();
/// {
///     let a = InstanceCounter::<Widget>::new_in(&registry);
///     let _b = a.clone();
///     assert_eq!(registry.balance_of::<Widget>(), 2);
/// }
/// assert!(registry.validate().is_clean());
/// ```
#[derive(Default)]
pub struct CounterRegistry {
    inner: Mutex<RegistryInner>,
}

impl CounterRegistry {
    /// Create an empty, independent registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first use
    pub fn global() -> &'static Arc<Self> {
        static GLOBAL: OnceLock<Arc<CounterRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Self::new()))
    }

    /// Counter storage for `T`, registered on first use
    ///
    /// Registration is keyed by `TypeId`, so two distinct types that demangle
    /// to the same short name still get separate counters.
    pub fn register<T: ?Sized + 'static>(&self) -> Arc<CounterSet> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let key = TypeId::of::<T>();
        if let Some(&slot) = inner.index.get(&key) {
            return Arc::clone(&inner.entries[slot]);
        }

        let name = short_type_name(type_name::<T>());
        log::trace!("Registering lifetime counters for {name}");
        let set = Arc::new(CounterSet::new(name));
        let slot = inner.entries.len();
        inner.entries.push(Arc::clone(&set));
        inner.index.insert(key, slot);
        set
    }

    /// Snapshot of `T`'s counters, if `T` was ever registered
    pub fn snapshot_of<T: ?Sized + 'static>(&self) -> Option<CounterSnapshot> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .index
            .get(&TypeId::of::<T>())
            .map(|&slot| inner.entries[slot].snapshot())
    }

    /// Current balance of `T`; zero for unregistered types
    pub fn balance_of<T: ?Sized + 'static>(&self) -> i64 {
        self.snapshot_of::<T>().map_or(0, |snapshot| snapshot.balance())
    }

    /// Names and snapshots of all registered types, in registration order
    pub fn entries(&self) -> Vec<(String, CounterSnapshot)> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .iter()
            .map(|set| (set.name().to_owned(), set.snapshot()))
            .collect()
    }

    /// Check every registered type for leaks and double frees
    pub fn validate(&self) -> ValidationReport {
        let problems: Vec<BalanceProblem> = self
            .entries()
            .into_iter()
            .filter(|(_, snapshot)| snapshot.balance() != 0)
            .map(|(type_name, snapshot)| BalanceProblem {
                type_name,
                balance: snapshot.balance(),
            })
            .collect();

        for problem in &problems {
            log::error!("{problem}");
        }
        if problems.is_empty() {
            log::info!("Lifetime counters balanced: no leaks or double frees found");
        }

        ValidationReport { problems }
    }

    /// Render per-type (when `detailed`) and overall counter tables
    pub fn render(&self, detailed: bool) -> String {
        let entries = self.entries();
        let mut out = String::new();

        if detailed {
            out.push_str("\nDetailed statistics:\n");
            out.push_str("====================\n");
            for (name, snapshot) in &entries {
                let _ = writeln!(out, " - {name}:");
                write_table(&mut out, snapshot);
            }
        }

        let mut overall = CounterSnapshot::default();
        for (_, snapshot) in &entries {
            overall.accumulate(snapshot);
        }

        out.push_str("\nOverall statistics:\n");
        out.push_str("===================\n");
        write_table(&mut out, &overall);
        out
    }

    /// Print the counter tables to standard output
    pub fn print(&self, detailed: bool) {
        print!("{}", self.render(detailed));
    }
}

fn write_table(out: &mut String, snapshot: &CounterSnapshot) {
    for event in LifetimeEvent::ALL {
        let _ = writeln!(out, "   {:<20} = {}", event.label(), snapshot.get(event));
    }
}

/// Strip module paths from a `std::any::type_name` string
///
/// `laser_engine::render::resource::ResourceHandle<laser_engine::render::resource::Device>`
/// becomes `ResourceHandle<Device>`.
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | '(' | ')' | '[' | ']' | '&' | ';' | ' ' | '*' => {
                out.push_str(&segment);
                segment.clear();
                out.push(c);
            }
            _ => segment.push(c),
        }
    }
    out.push_str(&segment);
    strip_lifetimes(&out)
}

/// Remove lifetime arguments (`'_`, `'static`, `'a`) and any `<>` left empty
fn strip_lifetimes(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\'' {
            out.push(c);
            continue;
        }
        while chars.peek().is_some_and(|next| next.is_alphanumeric() || *next == '_') {
            chars.next();
        }
        match chars.peek() {
            Some(',') => {
                chars.next();
                while chars.peek() == Some(&' ') {
                    chars.next();
                }
            }
            Some(' ') => {
                chars.next();
            }
            Some('>') => {
                let trimmed = out.trim_end_matches([',', ' ']).len();
                out.truncate(trimmed);
            }
            _ => {}
        }
    }
    out.replace("<>", "")
}

/// Kind of imbalance found for a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    /// More constructions than destructions
    Leak,
    /// More destructions than constructions
    DoubleFree,
}

/// One type whose counters do not balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceProblem {
    /// Display name of the type
    pub type_name: String,
    /// Constructions minus destructions
    pub balance: i64,
}

impl BalanceProblem {
    /// Leak or double free, depending on the sign of the balance
    pub const fn kind(&self) -> ProblemKind {
        if self.balance > 0 {
            ProblemKind::Leak
        } else {
            ProblemKind::DoubleFree
        }
    }
}

impl fmt::Display for BalanceProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ProblemKind::Leak => write!(f, "{} instance(s) of {} leaked", self.balance, self.type_name),
            ProblemKind::DoubleFree => write!(
                f,
                "{} instance(s) of {} destroyed more than once",
                -self.balance,
                self.type_name
            ),
        }
    }
}

/// Outcome of [`CounterRegistry::validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Every unbalanced type, in registration order
    pub problems: Vec<BalanceProblem>,
}

impl ValidationReport {
    /// No leaks and no double frees
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    /// Problem reported for the type with the given display name
    pub fn problem_for(&self, type_name: &str) -> Option<&BalanceProblem> {
        self.problems.iter().find(|problem| problem.type_name == type_name)
    }
}

/// Per-instance counter hook for type `T`
///
/// Embed one as a field to have the enclosing type's lifetime accounted under
/// `T`'s name. Creating it records a construction, cloning a copy
/// construction, and dropping it a destruction.
pub struct InstanceCounter<T: ?Sized + 'static> {
    counters: Arc<CounterSet>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized + 'static> InstanceCounter<T> {
    /// Record a construction in the global registry
    pub fn new() -> Self {
        Self::new_in(CounterRegistry::global())
    }

    /// Record a construction in the given registry
    pub fn new_in(registry: &CounterRegistry) -> Self {
        Self::with_event(registry.register::<T>(), LifetimeEvent::Construct)
    }

    fn with_event(counters: Arc<CounterSet>, event: LifetimeEvent) -> Self {
        counters.record(event);
        Self {
            counters,
            _marker: PhantomData,
        }
    }

    /// Create a new instance by taking over `source`, which stays alive
    pub fn take_from(source: &mut Self) -> Self {
        Self::with_event(Arc::clone(&source.counters), LifetimeEvent::MoveConstruct)
    }

    /// Take over `source` into an existing instance
    pub fn assign_from(&mut self, _source: &mut Self) {
        self.counters.record(LifetimeEvent::MoveAssign);
    }

    /// Counter storage this instance reports to
    pub fn counters(&self) -> &CounterSet {
        &self.counters
    }
}

impl<T: ?Sized + 'static> Default for InstanceCounter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> Clone for InstanceCounter<T> {
    fn clone(&self) -> Self {
        Self::with_event(Arc::clone(&self.counters), LifetimeEvent::CopyConstruct)
    }

    fn clone_from(&mut self, _source: &Self) {
        self.counters.record(LifetimeEvent::CopyAssign);
    }
}

impl<T: ?Sized + 'static> Drop for InstanceCounter<T> {
    fn drop(&mut self) {
        self.counters.record(LifetimeEvent::Destruct);
    }
}

impl<T: ?Sized + 'static> fmt::Debug for InstanceCounter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InstanceCounter").field(&self.counters.name()).finish()
    }
}

/// Decorator adding lifetime accounting to any value
///
/// # Examples
/// ```
/// # use laser_engine::foundation::counters::{CounterRegistry, Counted};
/// let registry = CounterRegistry::new();
/// let mut names = Vec::new();
/// names.push(Counted::new_in(String::from("faerie"), &registry));
/// names.push(names[0].clone());
/// assert_eq!(registry.balance_of::<String>(), 2);
/// drop(names);
/// assert_eq!(registry.balance_of::<String>(), 0);
/// ```
pub struct Counted<T: 'static> {
    value: T,
    counter: InstanceCounter<T>,
}

impl<T: 'static> Counted<T> {
    /// Wrap a value, accounted in the global registry
    pub fn new(value: T) -> Self {
        Self::new_in(value, CounterRegistry::global())
    }

    /// Wrap a value, accounted in the given registry
    pub fn new_in(value: T, registry: &CounterRegistry) -> Self {
        Self {
            value,
            counter: InstanceCounter::new_in(registry),
        }
    }

    /// Unwrap the value; the wrapper counts as destroyed
    pub fn into_inner(self) -> T {
        let Self { value, counter } = self;
        drop(counter);
        value
    }

    /// Move the contents into a new instance, leaving the default value behind
    pub fn take(&mut self) -> Self
    where
        T: Default,
    {
        Self {
            value: std::mem::take(&mut self.value),
            counter: InstanceCounter::take_from(&mut self.counter),
        }
    }

    /// Move `source`'s contents into `self`, leaving the default value in `source`
    pub fn move_assign(&mut self, source: &mut Self)
    where
        T: Default,
    {
        self.value = std::mem::take(&mut source.value);
        self.counter.assign_from(&mut source.counter);
    }
}

impl<T: 'static> Deref for Counted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: 'static> DerefMut for Counted<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Clone + 'static> Clone for Counted<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            counter: self.counter.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.value.clone_from(&source.value);
        self.counter.clone_from(&source.counter);
    }
}

impl<T: PartialEq + 'static> PartialEq for Counted<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Counted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Counted").field(&self.value).finish()
    }
}
