//! Exact rational numbers for constant folding and linear arithmetic.
//!
//! Fourier–Motzkin elimination multiplies constraint rows together, so the
//! coefficients must stay exact: a float rounding error would turn an
//! infeasible system into a feasible one (or worse, the reverse). Every
//! operation here is checked; overflow yields `None` and callers treat that
//! as "cannot decide", never as a result.

use std::cmp::Ordering;
use std::fmt;

/// A normalized fraction `num / den` with `den > 0` and `gcd(num, den) = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i128,
    den: i128,
}

/// Computed on magnitudes so `i128::MIN` has one; the result only fits back
/// into `i128` when at least one argument is a valid denominator.
fn gcd(a: i128, b: i128) -> u128 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn gcd_i128(a: i128, b: i128) -> Option<i128> {
    i128::try_from(gcd(a, b)).ok()
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Build `num / den`, normalizing sign and common factors.
    ///
    /// Returns `None` for a zero denominator or when normalization overflows
    /// (`i128::MIN` cannot be negated).
    pub fn new(num: i128, den: i128) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let (mut num, mut den) = (num, den);
        if den < 0 {
            num = num.checked_neg()?;
            den = den.checked_neg()?;
        }
        let g = gcd_i128(num, den)?;
        if g > 1 {
            num /= g;
            den /= g;
        }
        Some(Self { num, den })
    }

    pub const fn from_integer(n: i128) -> Self {
        Self { num: n, den: 1 }
    }

    pub fn numer(&self) -> i128 {
        self.num
    }

    pub fn denom(&self) -> i128 {
        self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn is_positive(&self) -> bool {
        self.num > 0
    }

    pub fn is_negative(&self) -> bool {
        self.num < 0
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn signum(&self) -> i32 {
        match self.num.cmp(&0) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    pub fn checked_neg(self) -> Option<Self> {
        Some(Self {
            num: self.num.checked_neg()?,
            den: self.den,
        })
    }

    pub fn abs(self) -> Option<Self> {
        if self.num < 0 {
            self.checked_neg()
        } else {
            Some(self)
        }
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        let g = gcd_i128(self.den, other.den)?;
        let lhs_scale = other.den / g;
        let rhs_scale = self.den / g;
        let num = self
            .num
            .checked_mul(lhs_scale)?
            .checked_add(other.num.checked_mul(rhs_scale)?)?;
        let den = self.den.checked_mul(lhs_scale)?;
        Self::new(num, den)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.checked_add(other.checked_neg()?)
    }

    pub fn checked_mul(self, other: Self) -> Option<Self> {
        // Cross-reduce first to keep intermediates small.
        let g1 = gcd_i128(self.num, other.den)?.max(1);
        let g2 = gcd_i128(other.num, self.den)?.max(1);
        let num = (self.num / g1).checked_mul(other.num / g2)?;
        let den = (self.den / g2).checked_mul(other.den / g1)?;
        Self::new(num, den)
    }

    pub fn checked_div(self, other: Self) -> Option<Self> {
        if other.is_zero() {
            return None;
        }
        self.checked_mul(Self::new(other.den, other.num)?)
    }

    /// Truncated remainder (sign follows the dividend), integers only.
    pub fn checked_rem(self, other: Self) -> Option<Self> {
        if !self.is_integer() || !other.is_integer() || other.is_zero() {
            return None;
        }
        Some(Self::from_integer(self.num.checked_rem(other.num)?))
    }

    /// Integer power by repeated squaring.
    pub fn checked_pow(self, mut exp: u32) -> Option<Self> {
        if exp == 0 {
            return Some(Self::ONE);
        }
        if self.is_zero() || self == Self::ONE {
            return Some(self);
        }
        if self == Self::from_integer(-1) {
            return Some(if exp % 2 == 0 { Self::ONE } else { self });
        }
        let mut base = self;
        let mut acc = Self::ONE;
        loop {
            if exp & 1 == 1 {
                acc = acc.checked_mul(base)?;
            }
            exp >>= 1;
            if exp == 0 {
                return Some(acc);
            }
            base = base.checked_mul(base)?;
        }
    }

    /// Parse an unsigned decimal literal such as `42`, `0.5` or `65535`.
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, f),
            None => (text, ""),
        };
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut num: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            num = num.checked_mul(10)?.checked_add((b - b'0') as i128)?;
        }
        let den = 10i128.checked_pow(u32::try_from(frac_part.len()).ok()?)?;
        Self::new(num, den)
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Render as an exact decimal when the denominator only has factors 2 and 5.
    fn exact_decimal(&self) -> Option<String> {
        let mut den = self.den;
        let (mut twos, mut fives) = (0u32, 0u32);
        while den % 2 == 0 {
            den /= 2;
            twos += 1;
        }
        while den % 5 == 0 {
            den /= 5;
            fives += 1;
        }
        if den != 1 {
            return None;
        }
        let digits = twos.max(fives);
        let scale = 10i128.checked_pow(digits)?;
        let scaled = self.num.checked_mul(scale / self.den)?;
        let sign = if scaled < 0 { "-" } else { "" };
        let magnitude = scaled.unsigned_abs();
        let scale = scale as u128;
        let frac = format!("{:0width$}", magnitude % scale, width = digits as usize);
        Some(format!("{sign}{}.{}", magnitude / scale, frac.trim_end_matches('0')))
    }
}

/// Exact comparison of `an/ad` and `bn/bd` (positive denominators) by
/// continued-fraction expansion; never overflows.
fn cmp_fraction(an: i128, ad: i128, bn: i128, bd: i128) -> Ordering {
    let (qa, ra) = (an.div_euclid(ad), an.rem_euclid(ad));
    let (qb, rb) = (bn.div_euclid(bd), bn.rem_euclid(bd));
    if qa != qb {
        return qa.cmp(&qb);
    }
    match (ra == 0, rb == 0) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        // ra/ad vs rb/bd  <=>  bd/rb vs ad/ra
        (false, false) => cmp_fraction(bd, rb, ad, ra),
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_fraction(self.num, self.den, other.num, other.den)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Self::from_integer(value as i128)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            return write!(f, "{}", self.num);
        }
        match self.exact_decimal() {
            Some(s) => f.write_str(&s),
            None => write!(f, "{}/{}", self.num, self.den),
        }
    }
}
