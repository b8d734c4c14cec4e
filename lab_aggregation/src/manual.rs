/*!

This is the long-form manual for `lab_aggregation` and `labdash`.

## Input

The input is a table with a header row. Four columns are required, in any order:

| column        | field         | required content |
|---------------|---------------|------------------|
| `Franchisee`  | `franchisee`  | yes              |
| `Sub Client`  | `sub_client`  | no               |
| `test name`   | `test_name`   | yes              |
| `Lab Partner` | `lab_partner` | no               |

The names can be changed with [`crate::ColumnNames`]. Other columns are ignored.
A table without one of the required columns is rejected as a whole with a
`Schema` error that lists what is missing.

Rows with an empty franchisee or an empty test name (whitespace counts as empty) are
dropped. If no row is left, the upload is rejected with `EmptyDataset`.

### `xlsx`

An Excel workbook. If the workbook has several worksheets, the worksheet can be chosen
with `excelWorksheetName`, otherwise the first one is used. Numbers are read as text.
Dates are written as `2023-01-01`, with the time of day appended when there is one.

### `csv`

Comma separated values, the first line being the header:

```text
Franchisee,Sub Client,test name,Lab Partner
Acme,Acme,CBC,LabX
Acme,Beta Sub,CMP,
```

## Filters

Both the tests and the franchisees have to be selected. An empty selection is an error,
it never means "all". By default every test is selected, along with the 10 franchisees
with the most records.

## Derived tables

All the tables come out of the same aggregation pass.

- **Volume by franchisee** the number of records per franchisee.
- **Top tests** the most common tests (15 by default).
- **Lab partner usage** the number of records per lab partner. Records without a lab partner
  are counted in a separate `missing` bucket.
- **Sub account status** the number of records where the sub client is the franchisee
  itself (ignoring case and surrounding whitespace) versus all the others. A missing sub
  client counts as a sub account.
- **Top tests per franchisee** the 5 most common tests of each franchisee.
- **Franchisee sub account percent** the share of records of each franchisee that went
  through a sub account, in percent with two decimals, rounded half up.

Counting tables are sorted by decreasing count, then by name (case sensitive, uppercase
first). Within a franchisee, tests with the same count keep the order in which they first
appear in the file.

## Configuration

`labdash` accepts a configuration file in JSON. All the sections are optional.

```text
{
  "outputSettings": { "reportName": "March volumes", "outputFile": "summary.json" },
  "dataSource": {
    "provider": "xlsx",
    "filePath": "march.xlsx",
    "excelWorksheetName": "Sheet1",
    "columns": { "franchisee": "Franchisee", "subClient": "Sub Client",
                 "testName": "test name", "labPartner": "Lab Partner" }
  },
  "filters": { "testNames": ["CBC"], "franchisees": ["Acme"], "defaultFranchiseeCount": 10 },
  "presentation": { "topTestsCount": 15, "testsPerFranchisee": 5,
                    "volumeRows": 20, "subAccountOnly": false },
  "chat": { "apiUrl": "https://api.openai.com/v1", "model": "gpt-4", "sampleRows": 200,
            "temperature": 0.3, "maxTokens": 500, "timeoutSeconds": 60 }
}
```

The `filePath` is relative to the directory of the configuration file. The options given
on the command line take precedence over the configuration file.

## Asking questions

With `--question` and an API key (`--api-key` or the `OPENAI_API_KEY` variable), the
first rows of the filtered data (200 by default, never more than 500) are sent along with
the question to an OpenAI-compatible chat completion service. Failures are reported as
authentication, transport or unexpected errors and are never retried.

 */
