/// Comparison operators (`field=op.value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    /// Equal (`eq`); case/accent-insensitive on text
    Eq,
    /// Greater than (`gt`)
    Gt,
    /// Greater than or equal (`gte`)
    Gte,
    /// Less than (`lt`)
    Lt,
    /// Less than or equal (`lte`)
    Lte,
    /// Pattern match with `*` wildcards (`like`)
    Like,
    /// Starts with (`stw`)
    StartsWith,
    /// Ends with (`enw`)
    EndsWith,
    /// Contains (`cs`)
    Contains,
}

impl ComparisonOperator {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "eq" => ComparisonOperator::Eq,
            "gt" => ComparisonOperator::Gt,
            "gte" => ComparisonOperator::Gte,
            "lt" => ComparisonOperator::Lt,
            "lte" => ComparisonOperator::Lte,
            "like" => ComparisonOperator::Like,
            "stw" => ComparisonOperator::StartsWith,
            "enw" => ComparisonOperator::EndsWith,
            "cs" => ComparisonOperator::Contains,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "eq",
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::Like => "like",
            ComparisonOperator::StartsWith => "stw",
            ComparisonOperator::EndsWith => "enw",
            ComparisonOperator::Contains => "cs",
        }
    }

    /// Operators that only make sense on text.
    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            ComparisonOperator::Like
                | ComparisonOperator::StartsWith
                | ComparisonOperator::EndsWith
                | ComparisonOperator::Contains
        )
    }

    /// Ordering operators (`gt`, `gte`, `lt`, `lte`).
    pub fn is_range(self) -> bool {
        matches!(
            self,
            ComparisonOperator::Gt
                | ComparisonOperator::Gte
                | ComparisonOperator::Lt
                | ComparisonOperator::Lte
        )
    }
}

/// Per-element comparison used by an `in` list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InMode {
    #[default]
    Eq,
    StartsWith,
    EndsWith,
    Contains,
}

impl InMode {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "eq" => InMode::Eq,
            "stw" => InMode::StartsWith,
            "enw" => InMode::EndsWith,
            "cs" => InMode::Contains,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InMode::Eq => "eq",
            InMode::StartsWith => "stw",
            InMode::EndsWith => "enw",
            InMode::Contains => "cs",
        }
    }
}

/// Direction of a relative date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateRangeOperator {
    /// Backwards from now (`ago`)
    Ago,
    /// Forwards from now (`for`)
    For,
}

impl DateRangeOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            DateRangeOperator::Ago => "ago",
            DateRangeOperator::For => "for",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateUnit {
    Day,
    Week,
    Month,
    Year,
}

impl DateUnit {
    pub fn parse(c: char) -> Option<Self> {
        Some(match c {
            'd' => DateUnit::Day,
            'w' => DateUnit::Week,
            'm' => DateUnit::Month,
            'y' => DateUnit::Year,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            DateUnit::Day => 'd',
            DateUnit::Week => 'w',
            DateUnit::Month => 'm',
            DateUnit::Year => 'y',
        }
    }

    /// Fixed-day weight, used only for coarse span checks.
    pub fn approximate_days(self) -> u64 {
        match self {
            DateUnit::Day => 1,
            DateUnit::Week => 7,
            DateUnit::Month => 30,
            DateUnit::Year => 365,
        }
    }
}

/// Collection containment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayMode {
    /// Every listed value is present (`incl`)
    Include,
    /// None of the listed values is present (`excl`)
    Exclude,
}

impl ArrayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ArrayMode::Include => "incl",
            ArrayMode::Exclude => "excl",
        }
    }
}

/// Boolean composition of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NestingOperator {
    And,
    Or,
}

impl NestingOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            NestingOperator::And => "and",
            NestingOperator::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Right-hand side of an `is` test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsValue {
    True,
    False,
    Null,
    /// `$empty`: NULL, empty text or empty collection
    Empty,
}

impl IsValue {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "true" => IsValue::True,
            "false" => IsValue::False,
            "null" => IsValue::Null,
            "$empty" => IsValue::Empty,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IsValue::True => "true",
            IsValue::False => "false",
            IsValue::Null => "null",
            IsValue::Empty => "$empty",
        }
    }
}
