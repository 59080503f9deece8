//! Textual syntax for types, places and region declarations.
//!
//! The JSON wire form spells these as strings (`"&'a mut Vec<T>"`,
//! `"self.*.items[0..4]"`, `"'a: 'b + 'c"`). Bare names come out as
//! argument-less [`Ty::Adt`] nodes; lowering resolves them to type
//! parameters or primitives once the enclosing item's scope is known.

use ks_intern::{Interner, Symbol};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, satisfy, u64 as dec_u64};
use nom::combinator::{all_consuming, map, not, opt, recognize, value};
use nom::multi::{many0, separated_list0, separated_list1};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated};
use nom::IResult;

use crate::place::{Place, PlaceElem};
use crate::ty::{Mutability, RegionRef, Ty};

type PResult<'i, O> = IResult<&'i str, O>;

/// Wraps a parser so it skips surrounding whitespace.
fn ws<'i, O, F>(inner: F) -> impl FnMut(&'i str) -> PResult<'i, O>
where
    F: FnMut(&'i str) -> PResult<'i, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Parser for identifiers (`foo`, `_bar`, `T0`)
fn ident(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// A keyword that must not run into a following identifier character.
fn keyword<'i>(kw: &'static str) -> impl FnMut(&'i str) -> PResult<'i, &'i str> {
    terminated(
        tag(kw),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )
}

/// Region name after the quote (`'a` -> `a`).
fn region_name(input: &str) -> PResult<'_, &str> {
    preceded(char('\''), ident)(input)
}

enum GenericArg {
    Region(RegionRef),
    Type(Ty),
}

struct Grammar<'a> {
    interner: &'a Interner,
}

impl Grammar<'_> {
    fn intern(&self, text: &str) -> Symbol {
        self.interner.intern(text)
    }

    fn region<'i>(&self, input: &'i str) -> PResult<'i, RegionRef> {
        map(region_name, |name| match name {
            "_" => RegionRef::Elided,
            "static" => RegionRef::Static,
            "unbounded" => RegionRef::Unbounded,
            other => RegionRef::Named(self.intern(other)),
        })(input)
    }

    fn ty<'i>(&self, input: &'i str) -> PResult<'i, Ty> {
        ws(alt((
            |i| self.reference(i),
            |i| self.raw_ptr(i),
            |i| self.fn_ptr(i),
            |i| self.slice_or_array(i),
            |i| self.tuple(i),
            |i| self.path(i),
        )))(input)
    }

    fn reference<'i>(&self, input: &'i str) -> PResult<'i, Ty> {
        let (input, _) = char('&')(input)?;
        let (input, region) = opt(ws(|i| self.region(i)))(input)?;
        let (input, mutable) = opt(ws(keyword("mut")))(input)?;
        let (input, target) = self.ty(input)?;
        let mutability = if mutable.is_some() {
            Mutability::Mut
        } else {
            Mutability::Shared
        };
        Ok((
            input,
            Ty::reference(region.unwrap_or(RegionRef::Elided), mutability, target),
        ))
    }

    fn raw_ptr<'i>(&self, input: &'i str) -> PResult<'i, Ty> {
        let (input, _) = char('*')(input)?;
        let (input, mutability) = ws(alt((
            value(Mutability::Shared, keyword("const")),
            value(Mutability::Mut, keyword("mut")),
        )))(input)?;
        let (input, target) = self.ty(input)?;
        Ok((
            input,
            Ty::RawPtr {
                mutability,
                target: Box::new(target),
            },
        ))
    }

    fn fn_ptr<'i>(&self, input: &'i str) -> PResult<'i, Ty> {
        let (input, _) = keyword("fn")(input)?;
        let (input, inputs) = delimited(
            ws(char('(')),
            separated_list0(char(','), |i| self.ty(i)),
            ws(char(')')),
        )(input)?;
        let (input, output) = opt(preceded(ws(tag("->")), |i| self.ty(i)))(input)?;
        Ok((
            input,
            Ty::FnPtr {
                inputs,
                output: Box::new(output.unwrap_or_else(Ty::unit)),
            },
        ))
    }

    fn slice_or_array<'i>(&self, input: &'i str) -> PResult<'i, Ty> {
        let (input, elem) = preceded(char('['), |i| self.ty(i))(input)?;
        let (input, len) = opt(preceded(ws(char(';')), ws(dec_u64)))(input)?;
        let (input, _) = ws(char(']'))(input)?;
        let elem = Box::new(elem);
        Ok((
            input,
            match len {
                Some(len) => Ty::Array(elem, len),
                None => Ty::Slice(elem),
            },
        ))
    }

    fn tuple<'i>(&self, input: &'i str) -> PResult<'i, Ty> {
        let (input, _) = char('(')(input)?;
        let (input, mut elems) = separated_list0(char(','), |i| self.ty(i))(input)?;
        let (input, trailing) = opt(ws(char(',')))(input)?;
        let (input, _) = ws(char(')'))(input)?;
        if elems.len() == 1 && trailing.is_none() {
            return Ok((input, elems.remove(0)));
        }
        Ok((input, Ty::Tuple(elems)))
    }

    fn generic_arg<'i>(&self, input: &'i str) -> PResult<'i, GenericArg> {
        alt((
            map(ws(|i| self.region(i)), GenericArg::Region),
            map(|i| self.ty(i), GenericArg::Type),
        ))(input)
    }

    fn path<'i>(&self, input: &'i str) -> PResult<'i, Ty> {
        let (input, name) = ident(input)?;
        let (input, generics) = opt(delimited(
            ws(char('<')),
            separated_list1(char(','), |i| self.generic_arg(i)),
            ws(char('>')),
        ))(input)?;
        let mut regions = Vec::new();
        let mut args = Vec::new();
        for arg in generics.unwrap_or_default() {
            match arg {
                GenericArg::Region(region) => regions.push(region),
                GenericArg::Type(ty) => args.push(ty),
            }
        }
        Ok((
            input,
            Ty::Adt {
                name: self.intern(name),
                regions,
                args,
            },
        ))
    }

    fn place<'i>(&self, input: &'i str) -> PResult<'i, Place> {
        let (input, base) = ws(ident)(input)?;
        let (input, projection) = many0(|i| self.place_elem(i))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((
            input,
            Place {
                base: self.intern(base),
                projection,
            },
        ))
    }

    fn place_elem<'i>(&self, input: &'i str) -> PResult<'i, PlaceElem> {
        alt((
            value(PlaceElem::Deref, tag(".*")),
            map(preceded(char('.'), alt((ident, digit1))), |name| {
                PlaceElem::Field(self.intern(name))
            }),
            map(
                delimited(
                    char('['),
                    separated_pair(ws(dec_u64), tag(".."), ws(dec_u64)),
                    char(']'),
                ),
                |(start, end)| PlaceElem::Range { start, end },
            ),
            map(delimited(char('['), ws(dec_u64), char(']')), PlaceElem::Index),
            map(preceded(char('@'), ident), |variant| {
                PlaceElem::Downcast(self.intern(variant))
            }),
        ))(input)
    }

    fn region_decl<'i>(&self, input: &'i str) -> PResult<'i, (Symbol, Vec<Symbol>)> {
        let (input, name) = ws(region_name)(input)?;
        let (input, bounds) = opt(preceded(
            ws(char(':')),
            separated_list1(char('+'), ws(region_name)),
        ))(input)?;
        let bounds = bounds
            .unwrap_or_default()
            .into_iter()
            .map(|bound| self.intern(bound))
            .collect();
        Ok((input, (self.intern(name), bounds)))
    }
}

/// Parses a type expression. Bare names are left unresolved.
#[must_use]
pub fn parse_ty(text: &str, interner: &Interner) -> Option<Ty> {
    let grammar = Grammar { interner };
    all_consuming(|i| grammar.ty(i))(text)
        .ok()
        .map(|(_, ty)| ty)
}

/// Parses a place (`x`, `x.f`, `x.*`, `v[2..5]`, `opt@Some.0`).
#[must_use]
pub fn parse_place(text: &str, interner: &Interner) -> Option<Place> {
    let grammar = Grammar { interner };
    all_consuming(|i| grammar.place(i))(text)
        .ok()
        .map(|(_, place)| place)
}

/// Parses a region parameter declaration (`'a` or `'a: 'b + 'c`).
///
/// Names are returned without their quote.
#[must_use]
pub fn parse_region_decl(text: &str, interner: &Interner) -> Option<(Symbol, Vec<Symbol>)> {
    let grammar = Grammar { interner };
    all_consuming(|i| grammar.region_decl(i))(text)
        .ok()
        .map(|(_, decl)| decl)
}

/// Parses a single region name (`'a`), returned without its quote.
#[must_use]
pub fn parse_region_name(text: &str, interner: &Interner) -> Option<Symbol> {
    all_consuming(ws(region_name))(text)
        .ok()
        .map(|(_, name)| interner.intern(name))
}
