use crate::ast::{
    Annotations, ArrayMode, ComparisonOperator, DateRangeOperator, DateUnit, InMode, IsValue,
    NestingOperator, Token,
};

/// `field=op.value`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub operator: ComparisonOperator,
    /// Raw value text; typed per field by the backends
    pub value: String,
    pub negated: bool,
    pub nesting_level: usize,
    pub annotations: Annotations,
}

impl Comparison {
    pub fn new(
        field: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<String>,
    ) -> Self {
        Comparison {
            field: field.into(),
            operator,
            value: value.into(),
            negated: false,
            nesting_level: 1,
            annotations: Annotations::default(),
        }
    }

    pub fn negate(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    pub fn at_level(mut self, level: usize) -> Self {
        self.nesting_level = level;
        self
    }
}

/// `field=is.[not.]value`
#[derive(Debug, Clone, PartialEq)]
pub struct IsToken {
    pub field: String,
    pub value: IsValue,
    pub negated: bool,
    pub annotations: Annotations,
}

impl IsToken {
    pub fn new(field: impl Into<String>, value: IsValue, negated: bool) -> Self {
        IsToken {
            field: field.into(),
            value,
            negated,
            annotations: Annotations::default(),
        }
    }

    /// `$empty` tests NULL or empty rather than a single value.
    pub fn is_empty_query(&self) -> bool {
        self.value == IsValue::Empty
    }
}

/// `field=[not.][mode.]in.(v1,v2,…)`
#[derive(Debug, Clone, PartialEq)]
pub struct InToken {
    pub field: String,
    pub values: Vec<String>,
    pub mode: InMode,
    pub negated: bool,
    pub annotations: Annotations,
}

impl InToken {
    pub fn new(field: impl Into<String>, values: Vec<String>, mode: InMode, negated: bool) -> Self {
        InToken {
            field: field.into(),
            values,
            mode,
            negated,
            annotations: Annotations::default(),
        }
    }
}

/// `field=[not.]<ago|for>.<N><unit>[e][s]`
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub field: String,
    pub operator: DateRangeOperator,
    pub amount: u32,
    pub unit: DateUnit,
    /// Select exactly the calendar unit at the offset
    pub exact: bool,
    /// Raw interval between now and the offset, no snapping
    pub strict: bool,
    pub negated: bool,
    pub annotations: Annotations,
}

impl DateRange {
    pub fn new(
        field: impl Into<String>,
        operator: DateRangeOperator,
        amount: u32,
        unit: DateUnit,
    ) -> Self {
        DateRange {
            field: field.into(),
            operator,
            amount,
            unit,
            exact: false,
            strict: false,
            negated: false,
            annotations: Annotations::default(),
        }
    }

    pub fn go_backwards(&self) -> bool {
        self.operator == DateRangeOperator::Ago
    }

    /// Span weighted with fixed day counts per unit.
    pub fn approximate_days(&self) -> u64 {
        u64::from(self.amount) * self.unit.approximate_days()
    }
}

/// `field.[not.]<incl|excl>(v1,v2,…)`
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayOperation {
    pub field: String,
    pub values: Vec<String>,
    pub mode: ArrayMode,
    pub negated: bool,
    pub annotations: Annotations,
}

impl ArrayOperation {
    pub fn new(field: impl Into<String>, values: Vec<String>, mode: ArrayMode, negated: bool) -> Self {
        ArrayOperation {
            field: field.into(),
            values,
            mode,
            negated,
            annotations: Annotations::default(),
        }
    }
}

/// `[not.]<and|or>=(…)` at level 1, `[not.]<and|or>(…)` below.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub operator: NestingOperator,
    pub children: Vec<Token>,
    pub negated: bool,
    /// Level of the group itself; its children sit one level deeper
    pub nesting_level: usize,
    pub annotations: Annotations,
}

impl Group {
    pub fn new(operator: NestingOperator, children: Vec<Token>, negated: bool, nesting_level: usize) -> Self {
        Group {
            operator,
            children,
            negated,
            nesting_level,
            annotations: Annotations::default(),
        }
    }
}

/// `field.with=(…)`
#[derive(Debug, Clone, PartialEq)]
pub struct NestedFilter {
    pub field: String,
    pub children: Vec<Token>,
    pub annotations: Annotations,
}

impl NestedFilter {
    /// Build the filter and scope every child under `field`.
    pub fn new(field: impl Into<String>, mut children: Vec<Token>) -> Self {
        let field = field.into();
        let scope = [field.clone()];
        children.iter_mut().for_each(|c| c.bind_scope(&scope));
        NestedFilter {
            field,
            children,
            annotations: Annotations::default(),
        }
    }
}
