use crate::ast::{
    ArrayOperation, Comparison, DateRange, Group, InToken, IsToken, Limit, MetaInclude,
    NestedFilter, Paging, Select, ShowCount, Sort,
};

/// Side information every token may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    /// Free text after `^` in the query
    pub comment: Option<String>,
    /// JSON path of the embedded object the token is scoped to.
    ///
    /// Empty for tokens that address table columns directly. Set once when an
    /// enclosing [`NestedFilter`] is constructed.
    pub json_path: Vec<String>,
}

/// One parsed unit of a query.
///
/// Tokens are immutable once built; both compiler backends match over this enum.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Single predicate
    ///
    /// # Examples
    /// ```text
    /// name=eq.Alice
    /// amount.gte.10
    /// ```
    Comparison(Comparison),

    /// Null / empty / boolean test
    ///
    /// # Examples
    /// ```text
    /// archived=is.true
    /// notes=is.not.$empty
    /// ```
    Is(IsToken),

    /// Membership test
    ///
    /// # Examples
    /// ```text
    /// status=in.(open,closed)
    /// name=not.stw.in.(a,b)
    /// ```
    In(InToken),

    /// Relative date window
    ///
    /// # Examples
    /// ```text
    /// created=ago.2w
    /// due=for.1mes
    /// ```
    DateRange(DateRange),

    /// Collection containment
    ///
    /// # Examples
    /// ```text
    /// tags.incl(red,blue)
    /// tags.not.excl(green)
    /// ```
    Array(ArrayOperation),

    /// Boolean composition
    ///
    /// # Examples
    /// ```text
    /// or=(status.eq.open,amount.gt.10)
    /// not.and(a.eq.1,b.eq.2)
    /// ```
    Group(Group),

    /// Filter scoped to an embedded JSON object or array
    ///
    /// # Example
    /// ```text
    /// address.with=(city.eq.Paris)
    /// ```
    NestedFilter(NestedFilter),

    /// Projection
    ///
    /// # Example
    /// ```text
    /// select=id,name
    /// ```
    Select(Select),

    /// Ordering, optionally with keyset continuation values
    Sort(Sort),

    /// Row cap
    Limit(Limit),

    /// Whether a total count is requested
    ShowCount(ShowCount),

    /// Paging envelope (level 1 only)
    ///
    /// # Example
    /// ```text
    /// paging=(sort(name.asc),limit.20,count.true)
    /// ```
    Paging(Paging),

    /// Side-channel metadata request
    ///
    /// # Example
    /// ```text
    /// metaInclude=filters,columns
    /// ```
    MetaInclude(MetaInclude),
}

/// Discriminant of a [`Token`], ordered by canonical priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenKind {
    Select,
    Comparison,
    DateRange,
    Is,
    In,
    Array,
    NestedFilter,
    Group,
    Sort,
    Limit,
    ShowCount,
    Paging,
    MetaInclude,
}

impl TokenKind {
    /// Position in the canonical serialization; lower comes first.
    ///
    /// Comparisons and date ranges share a slot.
    pub fn priority(self) -> u8 {
        match self {
            TokenKind::Select => 0,
            TokenKind::Comparison | TokenKind::DateRange => 1,
            TokenKind::Is => 2,
            TokenKind::In => 3,
            TokenKind::Array => 4,
            TokenKind::NestedFilter => 5,
            TokenKind::Group => 6,
            TokenKind::Sort => 7,
            TokenKind::Limit => 8,
            TokenKind::ShowCount => 9,
            TokenKind::Paging => 10,
            TokenKind::MetaInclude => 11,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Select => "select",
            TokenKind::Comparison => "comparison",
            TokenKind::DateRange => "dateRange",
            TokenKind::Is => "is",
            TokenKind::In => "in",
            TokenKind::Array => "array",
            TokenKind::NestedFilter => "nestedFilter",
            TokenKind::Group => "group",
            TokenKind::Sort => "sort",
            TokenKind::Limit => "limit",
            TokenKind::ShowCount => "count",
            TokenKind::Paging => "paging",
            TokenKind::MetaInclude => "metaInclude",
        }
    }

    /// Kinds that restrict which rows are returned.
    pub fn is_filter(self) -> bool {
        matches!(
            self,
            TokenKind::Comparison
                | TokenKind::DateRange
                | TokenKind::Is
                | TokenKind::In
                | TokenKind::Array
                | TokenKind::NestedFilter
                | TokenKind::Group
        )
    }
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Comparison(_) => TokenKind::Comparison,
            Token::Is(_) => TokenKind::Is,
            Token::In(_) => TokenKind::In,
            Token::DateRange(_) => TokenKind::DateRange,
            Token::Array(_) => TokenKind::Array,
            Token::Group(_) => TokenKind::Group,
            Token::NestedFilter(_) => TokenKind::NestedFilter,
            Token::Select(_) => TokenKind::Select,
            Token::Sort(_) => TokenKind::Sort,
            Token::Limit(_) => TokenKind::Limit,
            Token::ShowCount(_) => TokenKind::ShowCount,
            Token::Paging(_) => TokenKind::Paging,
            Token::MetaInclude(_) => TokenKind::MetaInclude,
        }
    }

    pub fn annotations(&self) -> &Annotations {
        match self {
            Token::Comparison(t) => &t.annotations,
            Token::Is(t) => &t.annotations,
            Token::In(t) => &t.annotations,
            Token::DateRange(t) => &t.annotations,
            Token::Array(t) => &t.annotations,
            Token::Group(t) => &t.annotations,
            Token::NestedFilter(t) => &t.annotations,
            Token::Select(t) => &t.annotations,
            Token::Sort(t) => &t.annotations,
            Token::Limit(t) => &t.annotations,
            Token::ShowCount(t) => &t.annotations,
            Token::Paging(t) => &t.annotations,
            Token::MetaInclude(t) => &t.annotations,
        }
    }

    fn annotations_mut(&mut self) -> &mut Annotations {
        match self {
            Token::Comparison(t) => &mut t.annotations,
            Token::Is(t) => &mut t.annotations,
            Token::In(t) => &mut t.annotations,
            Token::DateRange(t) => &mut t.annotations,
            Token::Array(t) => &mut t.annotations,
            Token::Group(t) => &mut t.annotations,
            Token::NestedFilter(t) => &mut t.annotations,
            Token::Select(t) => &mut t.annotations,
            Token::Sort(t) => &mut t.annotations,
            Token::Limit(t) => &mut t.annotations,
            Token::ShowCount(t) => &mut t.annotations,
            Token::Paging(t) => &mut t.annotations,
            Token::MetaInclude(t) => &mut t.annotations,
        }
    }

    pub fn comment(&self) -> Option<&str> {
        self.annotations().comment.as_deref()
    }

    pub fn json_path(&self) -> &[String] {
        &self.annotations().json_path
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.annotations_mut().comment = comment;
        self
    }

    /// Field the token filters on, if it is a single-field predicate.
    pub fn field(&self) -> Option<&str> {
        match self {
            Token::Comparison(t) => Some(&t.field),
            Token::Is(t) => Some(&t.field),
            Token::In(t) => Some(&t.field),
            Token::DateRange(t) => Some(&t.field),
            Token::Array(t) => Some(&t.field),
            Token::NestedFilter(t) => Some(&t.field),
            _ => None,
        }
    }

    /// Prefix this token's JSON path (and its children's) with `prefix`.
    pub(crate) fn bind_scope(&mut self, prefix: &[String]) {
        if prefix.is_empty() {
            return;
        }
        let annotations = self.annotations_mut();
        let mut path = prefix.to_vec();
        path.append(&mut annotations.json_path);
        annotations.json_path = path;

        match self {
            Token::Group(group) => group.children.iter_mut().for_each(|c| c.bind_scope(prefix)),
            Token::NestedFilter(nested) => {
                nested.children.iter_mut().for_each(|c| c.bind_scope(prefix))
            }
            _ => {}
        }
    }
}
