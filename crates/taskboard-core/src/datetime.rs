use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  Local,
  NaiveDate,
  NaiveTime,
  SubsecRound,
  TimeZone,
  Utc
};
use tracing::trace;

/// Parses the timestamp forms found in task files: full RFC 3339, or a
/// bare `YYYY-MM-DD` taken as UTC midnight.
pub fn parse_iso_timestamp(
  raw: &str
) -> anyhow::Result<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  let date = NaiveDate::parse_from_str(
    raw, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "not an ISO-8601 timestamp: \
       {raw}"
    )
  })?;
  Ok(
    date
      .and_time(NaiveTime::MIN)
      .and_utc()
  )
}

/// Drops sub-millisecond precision so a stamp survives a trip through
/// [`format_iso_timestamp`] unchanged.
pub fn to_millis(
  dt: DateTime<Utc>
) -> DateTime<Utc> {
  dt.trunc_subsecs(3)
}

pub fn format_iso_timestamp(
  dt: &DateTime<Utc>
) -> String {
  dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")
    .to_string()
}

/// Resolves a due-date expression typed at the terminal. Calendar dates
/// resolve to local midnight, like a date picker.
pub fn parse_due_expr(
  expr: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  let lowered =
    expr.trim().to_ascii_lowercase();
  trace!(expr = %lowered, "parsing due expression");

  let today =
    now.with_timezone(&Local).date_naive();

  match lowered.as_str() {
    | "" => Err(anyhow!(
      "due date cannot be empty"
    )),
    | "now" => Ok(to_millis(now)),
    | "today" => local_midnight(today),
    | "tomorrow" => local_midnight(
      today + Duration::days(1)
    ),
    | "yesterday" => local_midnight(
      today - Duration::days(1)
    ),
    | other => {
      if let Some(days) = other
        .strip_prefix('+')
        .and_then(|rest| {
          rest.strip_suffix('d')
        })
      {
        let days: i64 = days
          .parse()
          .with_context(|| {
            format!(
              "invalid day offset: \
               {expr}"
            )
          })?;
        return Duration::try_days(days)
          .and_then(|offset| {
            now.checked_add_signed(offset)
          })
          .map(to_millis)
          .ok_or_else(|| {
            anyhow!(
              "day offset out of range: \
               {expr}"
            )
          });
      }

      if let Ok(date) =
        NaiveDate::parse_from_str(
          other, "%Y-%m-%d"
        )
      {
        return local_midnight(date);
      }

      DateTime::parse_from_rfc3339(
        expr.trim()
      )
      .map(|dt| {
        to_millis(dt.with_timezone(&Utc))
      })
      .map_err(|_| {
        anyhow!(
          "unrecognized due date: \
           {expr}"
        )
      })
    }
  }
}

fn local_midnight(
  date: NaiveDate
) -> anyhow::Result<DateTime<Utc>> {
  Local
    .from_local_datetime(
      &date.and_time(NaiveTime::MIN)
    )
    .earliest()
    .map(|dt| dt.with_timezone(&Utc))
    .ok_or_else(|| {
      anyhow!(
        "local midnight does not \
         exist on {date}"
      )
    })
}

pub mod iso_date_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_iso_timestamp(dt)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_iso_timestamp(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => serializer
          .serialize_some(
            &super::super::format_iso_timestamp(
              value
            )
          ),
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let raw =
        Option::<String>::deserialize(
          deserializer
        )?;
      match raw {
        | Some(value)
          if !value.trim().is_empty() =>
        {
          super::super::parse_iso_timestamp(&value)
            .map(Some)
            .map_err(
              serde::de::Error::custom
            )
        }
        | _ => Ok(None)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    TimeZone,
    Utc
  };

  use super::{
    format_iso_timestamp,
    parse_due_expr,
    parse_iso_timestamp,
    to_millis
  };

  fn now() -> chrono::DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now")
  }

  #[test]
  fn formats_with_milliseconds() {
    assert_eq!(
      format_iso_timestamp(&now()),
      "2026-02-17T12:00:00.000Z"
    );
  }

  #[test]
  fn parses_rfc3339_and_bare_dates() {
    let parsed = parse_iso_timestamp(
      "2026-02-17T12:00:00.000Z"
    )
    .expect("parse rfc3339");
    assert_eq!(parsed, now());

    let offset = parse_iso_timestamp(
      "2026-02-17T14:00:00+02:00"
    )
    .expect("parse offset");
    assert_eq!(offset, now());

    let bare =
      parse_iso_timestamp("2024-01-15")
        .expect("parse date");
    assert_eq!(
      format_iso_timestamp(&bare),
      "2024-01-15T00:00:00.000Z"
    );

    assert!(
      parse_iso_timestamp("yesterday-ish")
        .is_err()
    );
  }

  #[test]
  fn parses_relative_day_offsets() {
    let parsed =
      parse_due_expr("+3d", now())
        .expect("parse offset");
    assert_eq!(
      parsed,
      now() + Duration::days(3)
    );
    assert_eq!(
      parse_due_expr("now", now())
        .expect("parse now"),
      now()
    );
  }

  #[test]
  fn tomorrow_is_after_today() {
    let today =
      parse_due_expr("today", now())
        .expect("parse today");
    let tomorrow =
      parse_due_expr("tomorrow", now())
        .expect("parse tomorrow");
    assert!(tomorrow > today);
    assert!(today <= now());
  }

  #[test]
  fn rejects_garbage() {
    assert!(
      parse_due_expr("someday", now())
        .is_err()
    );
    assert!(
      parse_due_expr("+xd", now())
        .is_err()
    );
    assert!(
      parse_due_expr("  ", now()).is_err()
    );
    assert!(
      parse_due_expr(
        "+9999999999999d",
        now()
      )
      .is_err()
    );
    assert!(
      parse_due_expr(
        "+-9999999999999d",
        now()
      )
      .is_err()
    );
  }

  #[test]
  fn due_stamps_keep_millisecond_precision() {
    let precise = now()
      + Duration::nanoseconds(123_456_789);
    let expected = now()
      + Duration::milliseconds(123);

    assert_eq!(
      to_millis(precise),
      expected
    );
    assert_eq!(
      parse_due_expr("now", precise)
        .expect("parse now"),
      expected
    );
    assert_eq!(
      parse_due_expr("+1d", precise)
        .expect("parse offset"),
      expected + Duration::days(1)
    );
    assert_eq!(
      parse_due_expr(
        "2026-02-17T12:00:00.123456Z",
        now()
      )
      .expect("parse rfc3339"),
      expected
    );
  }
}
