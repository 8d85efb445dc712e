//! Bracket atoms: `[isotope? symbol chirality? hcount? charge? class?]`.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, satisfy},
    combinator::{all_consuming, map, map_opt, map_res, opt, recognize},
    multi::many0_count,
    sequence::{pair, preceded},
    IResult,
};

use crate::{Atom, Element};

type Res<'a, T> = IResult<&'a str, T>;

fn isotope(input: &str) -> Res<u16> {
    map_res(digit1, |digits: &str| digits.parse::<u16>())(input)
}

fn aromatic_symbol(input: &str) -> Res<(Element, bool)> {
    map_opt(
        alt((
            tag("se"),
            tag("as"),
            tag("te"),
            tag("b"),
            tag("c"),
            tag("n"),
            tag("o"),
            tag("p"),
            tag("s"),
        )),
        |symbol: &str| {
            let mut capitalized = symbol.to_ascii_uppercase();
            capitalized.truncate(1);
            capitalized.push_str(&symbol[1..]);
            Element::from_symbol(&capitalized).map(|element| (element, true))
        },
    )(input)
}

fn two_letter_symbol(input: &str) -> Res<(Element, bool)> {
    map_opt(
        recognize(pair(
            satisfy(|c| c.is_ascii_uppercase()),
            satisfy(|c| c.is_ascii_lowercase()),
        )),
        |symbol: &str| Element::from_symbol(symbol).map(|element| (element, false)),
    )(input)
}

fn one_letter_symbol(input: &str) -> Res<(Element, bool)> {
    map_opt(recognize(satisfy(|c| c.is_ascii_uppercase())), |symbol: &str| {
        Element::from_symbol(symbol).map(|element| (element, false))
    })(input)
}

fn element_symbol(input: &str) -> Res<(Element, bool)> {
    alt((aromatic_symbol, two_letter_symbol, one_letter_symbol))(input)
}

fn chirality_class(input: &str) -> Res<&str> {
    alt((tag("TH"), tag("AL"), tag("SP"), tag("TB"), tag("OH")))(input)
}

// `@`, `@@`, and the long forms like `@TH1` or `@OH12`. Parsed and discarded.
fn chirality(input: &str) -> Res<&str> {
    recognize(pair(
        char('@'),
        opt(alt((tag("@"), recognize(pair(chirality_class, digit1))))),
    ))(input)
}

fn hydrogen_count(input: &str) -> Res<u8> {
    preceded(
        char('H'),
        map(opt(map_res(digit1, |digits: &str| digits.parse::<u8>())), |count| {
            count.unwrap_or(1)
        }),
    )(input)
}

fn charge(input: &str) -> Res<i8> {
    let (input, sign) = alt((char('+'), char('-')))(input)?;
    let (input, magnitude) = alt((
        map_res(digit1, |digits: &str| digits.parse::<i8>()),
        map_res(many0_count(char(sign)), |repeats| i8::try_from(repeats + 1)),
    ))(input)?;
    Ok((input, if sign == '+' { magnitude } else { -magnitude }))
}

fn atom_class(input: &str) -> Res<&str> {
    preceded(char(':'), digit1)(input)
}

fn bracket_atom(input: &str) -> Res<Atom> {
    let (input, isotope) = opt(isotope)(input)?;
    let (input, (element, aromatic)) = element_symbol(input)?;
    let (input, _) = opt(chirality)(input)?;
    let (input, hydrogens) = opt(hydrogen_count)(input)?;
    let (input, charge) = opt(charge)(input)?;
    let (input, _) = opt(atom_class)(input)?;
    Ok((
        input,
        Atom {
            element,
            aromatic,
            charge: charge.unwrap_or(0),
            isotope: isotope.unwrap_or(0),
            hydrogens: hydrogens.unwrap_or(0),
            bracket: true,
        },
    ))
}

/// Parse the text between `[` and `]`. Returns `None` if it is not a single atom.
pub(crate) fn parse_bracket_atom(content: &str) -> Option<Atom> {
    all_consuming(bracket_atom)(content)
        .ok()
        .map(|(_, atom)| atom)
}
