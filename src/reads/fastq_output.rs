use std::io::{self, Write};

use crate::reads::FastqRecord;

pub fn write_fastq_record(writer: &mut dyn Write, record: &FastqRecord) -> io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(&record.header)?;
    writer.write_all(b"\n")?;
    writer.write_all(&record.seq)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(&record.qual)?;
    writer.write_all(b"\n")
}

pub fn write_fastq_records<'a>(
    writer: &mut dyn Write,
    records: impl IntoIterator<Item = &'a FastqRecord>,
) -> io::Result<()> {
    for record in records {
        write_fastq_record(writer, record)?;
    }

    Ok(())
}
