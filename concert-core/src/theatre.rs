use std::collections::HashSet;

use concert_shared::dto::{PriceBand, Seat, SeatRow};

const BAND_A_ROWS: [SeatRow; 10] = [
    SeatRow::E, SeatRow::F, SeatRow::G, SeatRow::H, SeatRow::I,
    SeatRow::J, SeatRow::K, SeatRow::L, SeatRow::M, SeatRow::N,
];
const BAND_B_ROWS: [SeatRow; 4] = [SeatRow::O, SeatRow::P, SeatRow::Q, SeatRow::R];
const BAND_C_ROWS: [SeatRow; 4] = [SeatRow::A, SeatRow::B, SeatRow::C, SeatRow::D];

const FRONT_ROW_SEATS: u8 = 20;
const STANDARD_ROW_SEATS: u8 = 26;

/// Rows that belong to a price band, front to back.
pub fn rows_for(band: PriceBand) -> &'static [SeatRow] {
    match band {
        PriceBand::PriceBandA => &BAND_A_ROWS,
        PriceBand::PriceBandB => &BAND_B_ROWS,
        PriceBand::PriceBandC => &BAND_C_ROWS,
    }
}

pub fn band_of(row: SeatRow) -> PriceBand {
    match row {
        SeatRow::A | SeatRow::B | SeatRow::C | SeatRow::D => PriceBand::PriceBandC,
        SeatRow::O | SeatRow::P | SeatRow::Q | SeatRow::R => PriceBand::PriceBandB,
        _ => PriceBand::PriceBandA,
    }
}

pub fn seats_in_row(row: SeatRow) -> u8 {
    match band_of(row) {
        PriceBand::PriceBandC => FRONT_ROW_SEATS,
        _ => STANDARD_ROW_SEATS,
    }
}

/// Whether the seat exists in the theatre layout.
pub fn is_valid_seat(seat: &Seat) -> bool {
    seat.number >= 1 && seat.number <= seats_in_row(seat.row)
}

/// Finds `count` adjacent free seats in a single row of `band`.
///
/// Rows are scanned front to back and the first run that fits wins, so two
/// requests against the same unavailable set always get the same seats. An
/// empty result means no row of the band can seat the whole party together.
pub fn find_available_seats(count: u32, band: PriceBand, unavailable: &HashSet<Seat>) -> Vec<Seat> {
    if count == 0 {
        return Vec::new();
    }

    for row in rows_for(band) {
        let row_len = seats_in_row(*row) as u32;
        if count > row_len {
            continue;
        }

        let mut run_start = 1u32;
        let mut run_len = 0u32;
        for number in 1..=row_len {
            if unavailable.contains(&Seat::new(*row, number as u8)) {
                run_start = number + 1;
                run_len = 0;
                continue;
            }

            run_len += 1;
            if run_len == count {
                return (run_start..run_start + count)
                    .map(|n| Seat::new(*row, n as u8))
                    .collect();
            }
        }
    }

    Vec::new()
}
