//! Documentation content for the sieve CLI

use super::CliError;

/// Available documentation categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocCategory {
    Syntax,
    Operators,
    Groups,
    Dates,
    Arrays,
    Nested,
    Paging,
    Errors,
}

impl DocCategory {
    /// Parse category name from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "syntax" => Some(Self::Syntax),
            "operators" | "ops" | "comparison" => Some(Self::Operators),
            "groups" | "group" | "logic" => Some(Self::Groups),
            "dates" | "date" | "date_range" | "daterange" => Some(Self::Dates),
            "arrays" | "array" => Some(Self::Arrays),
            "nested" | "with" | "json" => Some(Self::Nested),
            "paging" | "sort" | "select" => Some(Self::Paging),
            "errors" | "error" => Some(Self::Errors),
            _ => None,
        }
    }
}

/// Get the docs overview (category listing)
pub fn get_docs_overview() -> &'static str {
    r#"SIEVE DOCUMENTATION

Sieve is a compact query language for filtering, sorting and paging entity
collections. A query is a list of fragments joined with '&'; each fragment
filters rows, picks columns, or controls paging. Queries compile to
parameterized SQL (Postgres or SQL Server) or run in memory over JSON records.

DOCUMENTATION CATEGORIES

  syntax            Fragments, nesting levels, comments and escaping
  operators         Comparison, is, and in operators
  groups            and/or groups and negation
  dates             Relative date ranges (ago / for)
  arrays            incl / excl over array columns
  nested            with(...) filters over embedded JSON columns
  paging            select, sort, limit, count, cursors and metaInclude
  errors            Error codes and what raises them

QUICK REFERENCE

  name=eq.Alice                      Comparison (case-insensitive for text)
  age=not.gt.30                      Negated comparison
  status=in.(open,held)              Membership
  created=ago.2w                     Relative date range
  or=(age.lt.18,age.gt.65)           Group
  tags.incl(vip)                     Array containment
  address.with=(city.eq.Oslo)        Nested JSON filter
  paging=(sort(name.asc),limit.20)   Paging envelope

Run 'sieve doc <category>' for detailed documentation.
"#
}

/// Get documentation for a specific category
pub fn get_doc_category(name: &str) -> Result<&'static str, CliError> {
    match DocCategory::from_str(name) {
        Some(DocCategory::Syntax) => Ok(SYNTAX_DOC),
        Some(DocCategory::Operators) => Ok(OPERATORS_DOC),
        Some(DocCategory::Groups) => Ok(GROUPS_DOC),
        Some(DocCategory::Dates) => Ok(DATES_DOC),
        Some(DocCategory::Arrays) => Ok(ARRAYS_DOC),
        Some(DocCategory::Nested) => Ok(NESTED_DOC),
        Some(DocCategory::Paging) => Ok(PAGING_DOC),
        Some(DocCategory::Errors) => Ok(ERRORS_DOC),
        None => Err(CliError::UnknownCategory(name.to_string())),
    }
}

const SYNTAX_DOC: &str = r#"SYNTAX - Fragments and Nesting Levels

FRAGMENTS
  A query is a list of fragments. At the top level (level 1) fragments are
  joined with '&' and use assignment syntax:

    name=eq.Alice&age=gt.30

  Inside a group, nested filter or paging envelope (level 2 and deeper)
  fragments are joined with ',' and use dot syntax:

    or=(name.eq.Alice,age.gt.30)

  Delimiters inside parentheses never split a fragment, so values in
  'in.(a,b,c)' stay together.

FIELD NAMES
  [A-Za-z_][A-Za-z0-9_]*

  'select', 'paging', 'metaInclude', 'and', 'or' and 'not' are reserved
  fragment heads at the top level.

COMMENTS
  A trailing '^text' outside parentheses attaches a comment to the fragment:

    name=eq.Alice^customer lookup

  Comments survive into the canonical form and never affect results.

ESCAPING
  Values are percent-decoded after the query is split, so an encoded
  delimiter stays part of the value: %2C (,), %26 (&), %28 ((), %29 ()) and
  %5E (^). A literal '%' is written %25. The canonical form escapes the same
  characters.

    name=eq.Smith%2C%20J    compares against "Smith, J"

CANONICAL FORM
  Equivalent queries serialize to one string: fragments (and group children)
  are ordered by kind (select, comparisons and date ranges, is, in, arrays,
  nested filters, groups, paging, metaInclude).

    sieve canonical 'paging=(limit.5)&name=eq.a'
    name=eq.a&paging=(limit.5)
"#;

const OPERATORS_DOC: &str = r#"OPERATORS - Comparison, Is and In

COMPARISON
  field=op.value            level 1
  field.op.value            level 2+
  field=not.op.value        negated

  eq      equal (text: case- and accent-insensitive)
  gt gte lt lte
          ordering; timestamps compare by date
  stw     starts with (text only)
  enw     ends with (text only)
  cs      contains (text only)
  like    '*' is the wildcard; '%', '_' and '\' are literal

  Values may contain dots: 'version=eq.1.2.3' compares against "1.2.3".

IS
  field=is.true   field=is.false   field=is.null   field=is.$empty
  field=is.not.null

  $empty matches NULL or the empty string on text, and zero elements on
  array columns.

IN
  status=in.(open,held)
  status=not.in.(closed)
  name=stw.in.(al,bo)        membership by prefix (also enw, cs)

NEGATION AND NULL
  A negated test on a nullable column also matches NULL: 'age=not.gt.30'
  keeps rows whose age is unknown.
"#;

const GROUPS_DOC: &str = r#"GROUPS - Boolean Combination

  and=(a.eq.1,b.eq.2)           level 1
  or=(a.eq.1,b.eq.2)
  not.and=(a.eq.1,b.eq.2)       negated group
  or(a.eq.1,and(b.eq.2,c.eq.3)) level 2+ (no '=')

Top-level fragments are combined with AND. Groups nest up to the configured
maximum depth (default 5); deeper queries fail with ExceededNesting.

A group holds filters only; select, paging and metaInclude inside a group
fail with InvalidGroup.

A negated group treats an unknown test (a comparison on NULL) as false
before negating, so 'not.or=(status.eq.closed,amount.lt.20)' keeps an open
row whose amount is NULL.
"#;

const DATES_DOC: &str = r#"DATES - Relative Date Ranges

  field=ago.Nu[e][s]        window before the reference instant
  field=for.Nu[e][s]        window after the reference instant
  field=not.ago.Nu          outside the window

  N      amount
  u      d (days), w (weeks), m (months), y (years)
  e      exact: only the calendar unit N units away
  s      strict: no snapping to unit boundaries

WINDOWS
  By default the far end snaps outward to its unit boundary and the
  reference forms the other end: 'ago.2w' runs from the start of the week
  two weeks back until now. Weeks start on the configured week_start
  (default Monday).

  With 'e' the window is that whole unit alone: 'ago.1me' is the previous
  calendar month, 'for.1de' is tomorrow.

  With 's' the window is the raw interval: 'ago.3ds' covers the last 72
  hours.

  'e' wins when both flags are given. Month and year arithmetic moves by
  calendar months and clamps to the end of short months.

The reference instant is passed per call; the CLI uses --now or the local
clock.
"#;

const ARRAYS_DOC: &str = r#"ARRAYS - Containment

  tags.incl(vip,new)        every value present
  tags.excl(spam)           no value present
  tags.not.incl(vip)        negated

The same dot syntax is used at every level. Element comparison is exact.
An empty or NULL array behaves as a single NULL element, so 'excl' matches
it and 'incl' does not.
"#;

const NESTED_DOC: &str = r#"NESTED - Filters over Embedded JSON

  address.with=(city.eq.Oslo,zip.stw.03)      level 1
  or(address.with(city.eq.Oslo),age.gt.30)    level 2+

The children address fields declared under the JSON column in the schema.

JSON OBJECT
  Children test the object's members directly.

JSON ARRAY
  The filter matches when at least one element satisfies every child. An
  empty array behaves as one element whose members are all NULL, so
  negated children still match it.

Nested filters may themselves contain groups and nested filters.
"#;

const PAGING_DOC: &str = r#"PAGING - Select, Sort, Limit and Count

SELECT
  select=name,age           project fields
  select=*                  all selectable fields

PAGING ENVELOPE
  paging=(sort(name.asc,created.desc),limit.20,count.true)

  sort(...)   field.asc | field.desc, comma separated
  limit.N     page size, at most max_page_size (default 1000)
  count.B     also return the total row count

  A query without a limit gets default_page_size (default 50). A paging
  envelope holding only 'count.true' asks for the count alone and produces
  no row statement.

  The key field is appended as a final ascending sort key when a sort is
  present, so pages are stable.

CURSORS (KEYSET PAGINATION)
  sort(name.asc.Bob,$key.asc.42)

  Each sort key carries the last row's value; the next page resumes strictly
  after that tuple. Cursors are all-or-nothing and must end on $key.
  '$null' and '$empty' stand for NULL and the empty string.

METAINCLUDE
  metaInclude=filters,columns,subscriptions

  Requests side-channel metadata. A query with only metaInclude fetches no
  rows.
"#;

const ERRORS_DOC: &str = r#"ERRORS - Codes

GRAMMAR
  MalformedQuery          unbalanced parentheses or a value that is not valid UTF-8 once decoded
  NotSupported            no grammar rule recognizes a fragment
  InvalidComparison       bad operator or value for a comparison
  InvalidIn               empty or malformed value list
  InvalidGroup            empty group or non-filter child
  InvalidDateRange        bad amount or unit, or span over the configured limit
  InvalidIsToken          value other than true/false/null/$empty
  InvalidSelect           empty, duplicated, or '*' mixed with fields
  InvalidPaging           unknown or repeated paging child
  InvalidLimit            limit not a positive integer
  InvalidShowCount        count not true/false
  InvalidMetaInclude      unknown metadata section
  InvalidArrayOperation   empty value list or bad element value
  InvalidNestedFilter     empty nested filter
  InvalidSort             bad direction or cursor

SEMANTIC
  TokenFieldInvalid       field missing or lacking the needed capability
  UnsupportedComparison   operator not valid for the field type
  ColumnNotSortable       sort on a field that is not sortable

RESOURCE LIMITS
  ExceededNesting         nesting deeper than max_nesting_depth
  ExceededMaxItems        limit above max_page_size

CONFIGURATION
  PropertyValueMustBePositive
  PropertyValueOutOfRange
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve() {
        assert_eq!(DocCategory::from_str("Date-Range"), Some(DocCategory::Dates));
        assert_eq!(DocCategory::from_str("with"), Some(DocCategory::Nested));
        assert!(get_doc_category("nope").is_err());
    }
}
