/// Declare a struct-of-arrays table.
///
/// ```
/// colonnade::table_spec! {
///     pub struct Particles: Dynamic {
///         position: [f32; 3],
///         mass: f32,
///     }
/// }
///
/// let mut particles = Particles::new();
/// let index = particles.push(([0.0, 1.0, 0.0], 2.5)).unwrap();
/// particles.set_mass(index, 3.0);
///
/// assert_eq!(particles.mass_slice(), [3.0]);
/// ```
///
/// The policy after the colon is one of `Fixed`, `Dynamic` or `Mutable` (see
/// [`Table`](crate::Table)). For `struct Name: Policy { field: Type, .. }`
/// this generates:
/// * `NameColumns`, holding one public [`Column`](crate::Column) per field.
/// * `Name`, wrapping a `Table<NameColumns, Policy>` that it dereferences to,
///   with `new`, `with_capacity` and `Default`.
/// * Per field: `get_<field>`, `get_<field>_mut`, `set_<field>`,
///   `<field>_slice` and `<field>_mut_slice`.
/// * For `Dynamic` and `Mutable`: `push_<field>` and `push(row)`, where a row
///   is a tuple with one value per field.
///
/// `Fixed` and `Dynamic` tables address rows by index and their accessors
/// panic on an index out of bounds. `Mutable` tables address rows by the
/// identifier a push returned, and their accessors return a
/// [`Result`](crate::Result) instead.
///
/// `get_<field>` always returns a reference; dereference or clone it to get
/// the value.
///
/// Identifiers of a `Mutable` table are never reused. A row's identifier
/// equals its slot only until the first erase: after that, erasing moves the
/// last row into the hole and new rows get identifiers past every one handed
/// out so far. Use `slot_of` to find where a row currently lives, and keep in
/// mind that `<field>_mut_slice` is in slot order, so moving values around in
/// it moves them to other identifiers.
///
/// Columns are only reachable through shared references, so they cannot be
/// moved out of the table:
///
/// ```compile_fail,E0133
/// colonnade::table_spec! {
///     struct Pairs: Mutable { x: u64, y: u64 }
/// }
///
/// let mut pairs = Pairs::new();
/// let mut other = PairsColumns::default();
/// pairs.push((1, 2)).unwrap();
/// let _ = pairs.get_mut(
///     0,
///     |columns| {
///         std::mem::swap(columns, &mut other);
///         &mut columns.x
///     },
///     "x",
/// );
/// ```
#[macro_export]
macro_rules! table_spec {
    (@columns $vis:vis $name:ident { $($(#[$field_meta:meta])* $field:ident : $ty:ty),+ }) => {
        $crate::paste::paste! {
            #[derive(Default)]
            $vis struct [<$name Columns>] {
                $(
                    $(#[$field_meta])*
                    pub $field: $crate::Column<$ty>,
                )+
            }

            unsafe impl $crate::table::Columns for [<$name Columns>] {
                const REGIONS: &'static [$crate::buffer::Region] = &[
                    $($crate::buffer::Region::of::<$ty>(),)+
                ];

                type Row = ($($ty,)+);

                unsafe fn bind(&mut self, arena: &$crate::buffer::Arena, layout: &$crate::buffer::Layout) {
                    let mut offsets = layout.offsets().iter().copied();
                    $(
                        unsafe {
                            self.$field.bind(arena.region(offsets.next().unwrap_or_default()));
                        }
                    )+
                }

                unsafe fn migrate(&mut self, arena: &$crate::buffer::Arena, layout: &$crate::buffer::Layout) {
                    let mut offsets = layout.offsets().iter().copied();
                    $(
                        unsafe {
                            self.$field.migrate(arena.region(offsets.next().unwrap_or_default()));
                        }
                    )+
                }

                fn visit_sizes(&self, visit: &mut dyn FnMut(u32)) {
                    $(visit(self.$field.size());)+
                }

                unsafe fn append_row(&mut self, row: Self::Row) {
                    let ($($field,)+) = row;
                    $(
                        unsafe { self.$field.append($field) };
                    )+
                }

                unsafe fn destroy_at(&mut self, slot: u32) {
                    $(
                        unsafe { self.$field.destroy_at(slot) };
                    )+
                }

                unsafe fn compact_remove(&mut self, erased: u32, last: u32) {
                    $(
                        unsafe { self.$field.compact_remove(erased, last) };
                    )+
                }

                unsafe fn reset(&mut self) {
                    $(
                        unsafe { self.$field.reset() };
                    )+
                }
            }
        }
    };

    (@fill $name:ident { $($field:ident : $ty:ty),+ }) => {
        $crate::paste::paste! {
            unsafe impl $crate::table::FillColumns for [<$name Columns>] {
                unsafe fn bind_filled(
                    &mut self,
                    arena: &$crate::buffer::Arena,
                    layout: &$crate::buffer::Layout,
                    capacity: u32,
                ) {
                    let mut offsets = layout.offsets().iter().copied();
                    $(
                        unsafe {
                            self.$field.bind_filled(
                                arena.region(offsets.next().unwrap_or_default()),
                                capacity,
                                <$ty as ::core::default::Default>::default,
                            );
                        }
                    )+
                }
            }
        }
    };

    (@wrapper $(#[$meta:meta])* $vis:vis $name:ident : $policy:ident { $($field:ident : $ty:ty),+ }) => {
        $crate::paste::paste! {
            $(#[$meta])*
            $vis struct $name {
                table: $crate::Table<[<$name Columns>], $crate::$policy>,
            }

            #[allow(dead_code)]
            impl $name {
                pub fn new() -> Self {
                    Self {
                        table: $crate::Table::new(),
                    }
                }

                pub fn with_capacity(capacity: u32) -> $crate::Result<Self> {
                    ::core::result::Result::Ok(Self {
                        table: $crate::Table::with_capacity(capacity)?,
                    })
                }

                $(
                    pub fn [<$field _slice>](&self) -> &[$ty] {
                        self.table.columns().$field.as_slice()
                    }

                    pub fn [<$field _mut_slice>](&mut self) -> &mut [$ty] {
                        // SAFETY: only the elements are handed out.
                        unsafe { self.table.columns_mut() }.$field.as_mut_slice()
                    }
                )+
            }

            impl ::core::default::Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl ::core::ops::Deref for $name {
                type Target = $crate::Table<[<$name Columns>], $crate::$policy>;

                fn deref(&self) -> &Self::Target {
                    &self.table
                }
            }

            impl ::core::ops::DerefMut for $name {
                fn deref_mut(&mut self) -> &mut Self::Target {
                    &mut self.table
                }
            }
        }
    };

    (@indexed $name:ident { $($field:ident : $ty:ty),+ }) => {
        $crate::paste::paste! {
            #[allow(dead_code)]
            impl $name {
                $(
                    pub fn [<get_ $field>](&self, index: u32) -> &$ty {
                        &self.table.columns().$field[index as usize]
                    }

                    pub fn [<get_ $field _mut>](&mut self, index: u32) -> &mut $ty {
                        &mut self.[<$field _mut_slice>]()[index as usize]
                    }

                    pub fn [<set_ $field>](&mut self, index: u32, value: $ty) {
                        self.[<$field _mut_slice>]()[index as usize] = value;
                    }
                )+
            }
        }
    };

    (@push $name:ident { $($field:ident : $ty:ty),+ }) => {
        $crate::paste::paste! {
            #[allow(dead_code)]
            impl $name {
                $(
                    pub fn [<push_ $field>](&mut self, value: $ty) -> $crate::Result<u32> {
                        // SAFETY: the projection only selects the field.
                        unsafe { self.table.push_with(value, |columns| &mut columns.$field) }
                    }
                )+

                /// Append one value to every column.
                pub fn push(&mut self, row: ($($ty,)+)) -> $crate::Result<u32> {
                    self.table.push_row(row)
                }
            }
        }
    };

    (@identified $name:ident { $($field:ident : $ty:ty),+ }) => {
        $crate::paste::paste! {
            #[allow(dead_code)]
            impl $name {
                $(
                    pub fn [<get_ $field>](&self, id: u32) -> $crate::Result<&$ty> {
                        self.table.get(id, |columns| &columns.$field, stringify!($field))
                    }

                    pub fn [<get_ $field _mut>](&mut self, id: u32) -> $crate::Result<&mut $ty> {
                        // SAFETY: the projection only selects the field.
                        unsafe { self.table.get_mut(id, |columns| &mut columns.$field, stringify!($field)) }
                    }

                    pub fn [<set_ $field>](&mut self, id: u32, value: $ty) -> $crate::Result<()> {
                        *self.[<get_ $field _mut>](id)? = value;
                        ::core::result::Result::Ok(())
                    }
                )+
            }
        }
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : Fixed {
            $($(#[$field_meta:meta])* $field:ident : $ty:ty),+ $(,)?
        }
    ) => {
        $crate::table_spec!(@columns $vis $name { $($(#[$field_meta])* $field : $ty),+ });
        $crate::table_spec!(@fill $name { $($field : $ty),+ });
        $crate::table_spec!(@wrapper $(#[$meta])* $vis $name : Fixed { $($field : $ty),+ });
        $crate::table_spec!(@indexed $name { $($field : $ty),+ });
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : Dynamic {
            $($(#[$field_meta:meta])* $field:ident : $ty:ty),+ $(,)?
        }
    ) => {
        $crate::table_spec!(@columns $vis $name { $($(#[$field_meta])* $field : $ty),+ });
        $crate::table_spec!(@wrapper $(#[$meta])* $vis $name : Dynamic { $($field : $ty),+ });
        $crate::table_spec!(@indexed $name { $($field : $ty),+ });
        $crate::table_spec!(@push $name { $($field : $ty),+ });
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : Mutable {
            $($(#[$field_meta:meta])* $field:ident : $ty:ty),+ $(,)?
        }
    ) => {
        $crate::table_spec!(@columns $vis $name { $($(#[$field_meta])* $field : $ty),+ });
        $crate::table_spec!(@wrapper $(#[$meta])* $vis $name : Mutable { $($field : $ty),+ });
        $crate::table_spec!(@identified $name { $($field : $ty),+ });
        $crate::table_spec!(@push $name { $($field : $ty),+ });
    };
}
